//! Single-threaded reader agent (§4.7): demux, route, seek, backpressure, EOF.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clocks;
use crate::config::{EngineConfig, MAX_QUEUE_SIZE, MIN_FRAMES};
use crate::control::Controller;
use crate::decoder::FinishedFlag;
use crate::demux::{DemuxEvent, Demuxer, SeekRequest, StreamInfo};
use crate::frame::SharedFrameQueue;
use crate::packet::{MediaKind, Packet, PacketEntry};
use crate::packet_queue::PacketQueue;

const READ_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Fallback bytes/second used to turn a relative-seconds byte-seek into a
/// byte offset when the demuxer can't report a bit rate, matching ffplay's
/// own fallback constant for the same case.
const BYTE_SEEK_FALLBACK_BYTES_PER_SEC: f64 = 180_000.0;

/// One opened stream's queue plus the flag its decoder publishes EOF
/// completion through.
pub struct OpenedStream {
    pub info: StreamInfo,
    pub pktq: Arc<PacketQueue>,
    pub finished: FinishedFlag,
    /// True once a frame queue downstream of this stream has gone empty
    /// after `finished` was set; the reader only needs `finished` plus the
    /// decoder's own frame-queue emptiness, tracked by the agent that owns
    /// it, so this is supplied by the caller each EOF check.
    pub frame_queue_empty: Box<dyn Fn() -> bool + Send>,
}

pub struct Reader<D: Demuxer> {
    demuxer: D,
    streams: Vec<OpenedStream>,
    config: EngineConfig,
    controller: Arc<Controller>,
    clocks: Arc<Clocks>,
    eof: bool,
}

impl<D: Demuxer> Reader<D> {
    pub fn new(demuxer: D, streams: Vec<OpenedStream>, config: EngineConfig, controller: Arc<Controller>, clocks: Arc<Clocks>) -> Self {
        Self { demuxer, streams, config, controller, clocks, eof: false }
    }

    pub fn run(mut self) {
        for s in &self.streams {
            s.pktq.start();
        }
        loop {
            if self.controller.is_aborted() {
                break;
            }

            if let Some(seek) = self.controller.take_seek() {
                self.handle_seek(seek);
                continue;
            }

            if self.controller.take_queue_attachments_req() {
                self.queue_attached_pictures();
            }

            if self.should_backpressure() {
                self.controller.wait_continue_read(READ_RETRY_INTERVAL);
                continue;
            }

            if self.all_streams_finished() {
                // Mirrors ffplay.c's `is->loop != 1 && (!is->loop || --is->loop)`:
                // 0 loops forever, N>1 replays N-1 more times, 1 plays once.
                let should_loop = self.config.loop_count != 1
                    && (self.config.loop_count == 0 || {
                        self.config.loop_count -= 1;
                        self.config.loop_count != 0
                    });
                if should_loop {
                    self.handle_seek(crate::control::PendingSeek { rel_seconds: f64::NEG_INFINITY, by_bytes: false });
                    continue;
                } else if self.config.autoexit {
                    self.controller.set_end_reason(playback_types::PlaybackEndReason::Eof);
                    self.controller.request_abort();
                    break;
                } else {
                    self.controller.wait_continue_read(READ_RETRY_INTERVAL);
                    continue;
                }
            }

            match self.demuxer.read_packet() {
                Ok(DemuxEvent::Packet(pkt)) => self.route_packet(pkt),
                Ok(DemuxEvent::Eof) => {
                    self.eof = true;
                    for s in &self.streams {
                        s.pktq.put_null(s.info.id.0);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    for s in &self.streams {
                        s.pktq.put_null(s.info.id.0);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "transient read error, retrying");
                    std::thread::sleep(READ_RETRY_INTERVAL);
                }
            }
        }

        for s in &self.streams {
            s.pktq.abort();
        }
    }

    fn route_packet(&mut self, pkt: Packet) {
        let start = self.config.start_seconds;
        let end = self.config.duration_seconds.map(|d| start + d);
        if pkt.pts < start || end.is_some_and(|e| pkt.pts > e) {
            return;
        }
        if let Some(stream) = self.streams.iter().find(|s| s.info.id.0 == pkt.stream_id) {
            stream.pktq.put(PacketEntry::Data(pkt));
        }
    }

    /// §4.7 step 3: for any opened video stream carrying an attached
    /// picture, enqueue one copy of it followed by a null packet so the
    /// decoder drains it and the reader can detect EOF for that stream.
    fn queue_attached_pictures(&mut self) {
        for s in &self.streams {
            if !s.info.attached_pic || s.info.kind != MediaKind::Video {
                continue;
            }
            match self.demuxer.attached_picture(s.info.id) {
                Some(pkt) => {
                    tracing::debug!(stream = s.info.id.0, "queuing attached picture");
                    s.pktq.put(PacketEntry::Data(pkt));
                    s.pktq.put_null(s.info.id.0);
                }
                None => tracing::warn!(stream = s.info.id.0, "attached_pic set but demuxer returned none"),
            }
        }
    }

    fn should_backpressure(&self) -> bool {
        if self.config.infinite_buffer {
            return false;
        }
        let total_bytes: usize = self.streams.iter().map(|s| s.pktq.size()).sum();
        if total_bytes > MAX_QUEUE_SIZE {
            return true;
        }
        self.streams.iter().all(|s| stream_has_enough(s))
    }

    fn all_streams_finished(&self) -> bool {
        if !self.eof || self.streams.is_empty() {
            return false;
        }
        self.streams.iter().all(|s| {
            let finished_serial = s.finished.get();
            let current_serial = s.pktq.serial();
            finished_serial == Some(current_serial) && (s.frame_queue_empty)()
        })
    }

    /// §4.8 `stream_seek(pos, rel, by_bytes)`. `seek.rel_seconds` is always
    /// an offset from the current position (ffplay computes
    /// `pos = get_master_clock(is) + incr`); only the loop-to-start request
    /// (`NEG_INFINITY`) resolves straight to absolute 0, bypassing both the
    /// master-clock anchor and the byte-seek path.
    fn handle_seek(&mut self, seek: crate::control::PendingSeek) {
        let is_loop_restart = seek.rel_seconds == f64::NEG_INFINITY;
        let by_bytes = !is_loop_restart && seek.by_bytes;
        let target = if is_loop_restart {
            0
        } else if by_bytes {
            let bytes_per_sec =
                self.demuxer.bit_rate_bps().map(|bps| bps as f64 / 8.0).unwrap_or(BYTE_SEEK_FALLBACK_BYTES_PER_SEC);
            let current_bytes = self.demuxer.byte_position().max(0) as f64;
            (current_bytes + seek.rel_seconds * bytes_per_sec).max(0.0) as i64
        } else {
            let master = self.clocks.master_value();
            let base_seconds = if master.is_nan() { 0.0 } else { master };
            ((base_seconds + seek.rel_seconds).max(0.0) * 1_000_000.0) as i64
        };
        let req = SeekRequest { target, min: i64::MIN, max: i64::MAX, by_bytes };
        if self.demuxer.seek(req).is_err() {
            tracing::warn!("seek failed");
            return;
        }
        for s in &self.streams {
            s.pktq.flush();
            s.pktq.put(PacketEntry::Flush);
        }
        if by_bytes {
            self.clocks.external.set(f64::NAN, self.clocks.external.serial_ref().get());
        } else {
            self.clocks.external.set(target as f64 / 1_000_000.0, self.clocks.external.serial_ref().get());
        }
        self.eof = false;
        self.controller.request_queue_attachments();
    }
}

fn stream_has_enough(s: &OpenedStream) -> bool {
    if s.info.attached_pic {
        return true;
    }
    let nb_packets = s.pktq.nb_packets();
    let duration = s.pktq.duration();
    nb_packets > MIN_FRAMES && (duration <= 0.0 || duration > 1.0)
}
