//! Per-media decoder boundary (§1) and the agent loop that drives it (§4.4).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::frame::{Frame, SharedFrameQueue};
use crate::packet::{PacketEntry, Serial};
use crate::packet_queue::{GetResult, PacketQueue};

/// One decoded unit emitted by a [`Decoder`]. `pts`/`nb_samples` carry the
/// information the agent needs to synthesize timestamps when the codec
/// doesn't supply its own.
pub struct DecodedUnit<P> {
    pub payload: P,
    pub pts: Option<f64>,
    pub nb_samples: usize,
    pub duration: f64,
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Out-of-scope external collaborator: transforms packets into zero or
/// more frames and is flushable. One instance per media stream.
pub trait Decoder: Send {
    type Payload;

    fn send_packet(&mut self, data: &[u8]) -> Result<(), String>;

    /// `Ok(None)` means the codec needs more input before it can emit
    /// another frame (not an error).
    fn receive_frame(&mut self) -> Result<Option<DecodedUnit<Self::Payload>>, String>;

    fn flush(&mut self);
}

/// Shared "finished" marker: `None` until EOF has drained through this
/// decoder, then `Some(serial)` of the queue generation that finished.
/// Cleared on the next flush. Combined with an empty frame queue, this is
/// how the reader detects end of stream (§4.4, §4.7).
#[derive(Clone)]
pub struct FinishedFlag(Arc<AtomicI64>);

impl FinishedFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicI64::new(-1)))
    }

    pub fn set(&self, serial: Serial) {
        self.0.store(serial as i64, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(-1, Ordering::Release);
    }

    pub fn get(&self) -> Option<Serial> {
        let v = self.0.load(Ordering::Acquire);
        if v < 0 { None } else { Some(v as Serial) }
    }
}

impl Default for FinishedFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one [`Decoder`] from its packet queue into its frame queue.
///
/// Audio timestamp synthesis (`next_pts += nb_samples / sample_rate`) and
/// video's "substitute DTS for PTS when reordering is disabled" are both
/// supported via agent configuration rather than per-media subclassing,
/// matching the design note that replaces codec-kind dispatch with data
/// instead of virtual-call branching wherever the engine itself decides
/// the behavior.
pub struct DecoderAgent<D: Decoder> {
    decoder: D,
    pktq: Arc<PacketQueue>,
    frameq: Arc<SharedFrameQueue<D::Payload>>,
    finished: FinishedFlag,
    next_pts: f64,
    sample_rate_hz: u32,
    synthesize_pts: bool,
    substitute_dts_for_pts: bool,
    last_pkt_dts: f64,
    last_pkt_pts: f64,
}

impl<D: Decoder> DecoderAgent<D> {
    pub fn new(
        decoder: D,
        pktq: Arc<PacketQueue>,
        frameq: Arc<SharedFrameQueue<D::Payload>>,
        synthesize_pts: bool,
        sample_rate_hz: u32,
        substitute_dts_for_pts: bool,
    ) -> Self {
        Self {
            decoder,
            pktq,
            frameq,
            finished: FinishedFlag::new(),
            next_pts: f64::NAN,
            sample_rate_hz,
            synthesize_pts,
            substitute_dts_for_pts,
            last_pkt_dts: f64::NAN,
            last_pkt_pts: f64::NAN,
        }
    }

    pub fn finished_flag(&self) -> FinishedFlag {
        self.finished.clone()
    }

    /// Run the decode loop until the packet queue is aborted.
    pub fn run(mut self) {
        loop {
            match self.pktq.get(true) {
                GetResult::Aborted => {
                    self.frameq.signal();
                    return;
                }
                GetResult::Empty => continue,
                GetResult::Entry(entry, serial) => self.handle_entry(entry, serial),
            }
        }
    }

    fn handle_entry(&mut self, entry: PacketEntry, serial: Serial) {
        match entry {
            PacketEntry::Flush => {
                // Between a flush marker and the first real frame the
                // agent must not emit a frame; draining silently here
                // (rather than emitting whatever is left in the codec's
                // internal buffers) is exactly that guarantee.
                self.decoder.flush();
                self.next_pts = f64::NAN;
                self.finished.clear();
            }
            PacketEntry::EndOfStream { .. } => {
                loop {
                    match self.decoder.receive_frame() {
                        Ok(Some(unit)) => self.emit(unit, serial),
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "decoder drain error on eof");
                            break;
                        }
                    }
                }
                self.finished.set(serial);
            }
            PacketEntry::Data(pkt) => {
                self.last_pkt_dts = pkt.dts;
                self.last_pkt_pts = pkt.pts;
                if let Err(e) = self.decoder.send_packet(&pkt.data) {
                    tracing::warn!(error = %e, "decoder send_packet error, dropping packet");
                    return;
                }
                loop {
                    match self.decoder.receive_frame() {
                        Ok(Some(unit)) => self.emit(unit, serial),
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "decoder receive_frame error");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn emit(&mut self, unit: DecodedUnit<D::Payload>, serial: Serial) {
        let pts = if self.substitute_dts_for_pts {
            self.last_pkt_dts
        } else if let Some(p) = unit.pts {
            p
        } else if self.synthesize_pts && self.sample_rate_hz > 0 {
            if self.next_pts.is_nan() {
                // Anchor the synthetic timeline on the most recent packet's
                // own pts if it had one; otherwise start from zero.
                self.next_pts = if self.last_pkt_pts.is_nan() { 0.0 } else { self.last_pkt_pts };
            }
            let p = self.next_pts;
            self.next_pts += unit.nb_samples as f64 / self.sample_rate_hz as f64;
            p
        } else {
            f64::NAN
        };

        let mut frame = Frame::new(unit.payload, pts, unit.duration, serial);
        frame.format = unit.format;
        frame.width = unit.width;
        frame.height = unit.height;
        self.frameq.push_blocking(frame);
    }
}
