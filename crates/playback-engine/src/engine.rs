//! Top-level engine instance (`VideoState` in spec.md's terms): owns every
//! clock, queue, and thread, and implements §5's startup/teardown ordering.

use std::sync::Arc;
use std::thread::JoinHandle;

use playback_types::StatusSnapshot;

use crate::clock::{ClockId, Clocks, SerialRef};
use crate::config::{AUDIO_QUEUE_SIZE, EngineConfig, SUBTITLE_QUEUE_SIZE, VIDEO_QUEUE_SIZE};
use crate::control::Controller;
use crate::decoder::{Decoder, DecoderAgent, FinishedFlag};
use crate::demux::Demuxer;
use crate::frame::SharedFrameQueue;
use crate::packet_queue::PacketQueue;
use crate::reader::{OpenedStream, Reader};
use crate::sinks::{AudioSamples, AudioSink, AudioSpec, SubtitlePicture, VideoPicture, VideoSink};
use crate::status::PlayerStatusState;
use crate::video_refresh::VideoRefresh;

struct AudioParts {
    pktq: Arc<PacketQueue>,
    frameq: Arc<SharedFrameQueue<AudioSamples>>,
    finished: FinishedFlag,
    decoder_handle: Option<JoinHandle<()>>,
}

struct VideoParts {
    pktq: Arc<PacketQueue>,
    frameq: Arc<SharedFrameQueue<VideoPicture>>,
    finished: FinishedFlag,
    decoder_handle: Option<JoinHandle<()>>,
}

struct SubtitleParts {
    pktq: Arc<PacketQueue>,
    frameq: Arc<SharedFrameQueue<SubtitlePicture>>,
    finished: FinishedFlag,
    decoder_handle: Option<JoinHandle<()>>,
}

/// Owns the whole playback session. Exactly one engine per process, per
/// the design note retiring the original's global mutable state (§9).
pub struct Engine {
    pub config: EngineConfig,
    pub controller: Arc<Controller>,
    pub clocks: Arc<Clocks>,
    pub status: Arc<std::sync::Mutex<PlayerStatusState>>,
    audio: Option<AudioParts>,
    video: Option<VideoParts>,
    subtitle: Option<SubtitleParts>,
    audio_sink: Option<Box<dyn AudioSink>>,
    reader_handle: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let audio_serial = SerialRef::new();
        let video_serial = SerialRef::new();
        let clocks = Arc::new(Clocks::new(audio_serial, video_serial, false, false, config.master_clock_id()));
        let controller = Arc::new(Controller::new(config.initial_volume_percent));
        Self {
            config,
            controller,
            clocks,
            status: PlayerStatusState::shared(),
            audio: None,
            video: None,
            subtitle: None,
            audio_sink: None,
            reader_handle: None,
        }
    }

    /// Open the audio stream's decoder and spawn its agent thread.
    /// `sample_rate_hz` backs the PTS synthesis the agent falls back to when
    /// the decoder doesn't supply its own per-frame timestamp.
    pub fn open_audio<Dec>(&mut self, decoder: Dec, sample_rate_hz: u32)
    where
        Dec: Decoder<Payload = AudioSamples> + 'static,
    {
        let pktq = PacketQueue::new();
        let frameq = SharedFrameQueue::new(AUDIO_QUEUE_SIZE, true, pktq.clone());
        self.clocks.audio.serial_ref().set(pktq.serial());
        self.clocks.set_has_audio(true);
        let agent = DecoderAgent::new(decoder, pktq.clone(), frameq.clone(), true, sample_rate_hz, false);
        let finished = agent.finished_flag();
        let handle = std::thread::Builder::new()
            .name("decoder-audio".to_string())
            .spawn(move || agent.run())
            .expect("spawn decoder-audio");
        self.audio = Some(AudioParts { pktq, frameq, finished, decoder_handle: Some(handle) });
    }

    pub fn open_video<Dec>(&mut self, decoder: Dec)
    where
        Dec: Decoder<Payload = VideoPicture> + 'static,
    {
        let pktq = PacketQueue::new();
        let frameq = SharedFrameQueue::new(VIDEO_QUEUE_SIZE, true, pktq.clone());
        self.clocks.video.serial_ref().set(pktq.serial());
        self.clocks.set_has_video(true);
        let agent = DecoderAgent::new(decoder, pktq.clone(), frameq.clone(), false, 0, self.config.disable_video_reorder);
        let finished = agent.finished_flag();
        let handle = std::thread::Builder::new()
            .name("decoder-video".to_string())
            .spawn(move || agent.run())
            .expect("spawn decoder-video");
        self.video = Some(VideoParts { pktq, frameq, finished, decoder_handle: Some(handle) });
    }

    pub fn open_subtitle<Dec>(&mut self, decoder: Dec)
    where
        Dec: Decoder<Payload = SubtitlePicture> + 'static,
    {
        let pktq = PacketQueue::new();
        let frameq = SharedFrameQueue::new(SUBTITLE_QUEUE_SIZE, false, pktq.clone());
        let agent = DecoderAgent::new(decoder, pktq.clone(), frameq.clone(), false, 0, false);
        let finished = agent.finished_flag();
        let handle = std::thread::Builder::new()
            .name("decoder-subtitle".to_string())
            .spawn(move || agent.run())
            .expect("spawn decoder-subtitle");
        self.subtitle = Some(SubtitleParts { pktq, frameq, finished, decoder_handle: Some(handle) });
    }

    fn opened_streams<D: Demuxer>(&self, demuxer: &D) -> Vec<OpenedStream> {
        let mut out = Vec::new();
        for info in demuxer.streams() {
            let parts: Option<(Arc<PacketQueue>, FinishedFlag, Box<dyn Fn() -> bool + Send>)> = match info.kind {
                crate::packet::MediaKind::Audio => self.audio.as_ref().map(|a| {
                    let fq = a.frameq.clone();
                    (a.pktq.clone(), a.finished.clone(), Box::new(move || fq.with_lock(|q| q.nb_remaining() == 0)) as Box<dyn Fn() -> bool + Send>)
                }),
                crate::packet::MediaKind::Video => self.video.as_ref().map(|v| {
                    let fq = v.frameq.clone();
                    (v.pktq.clone(), v.finished.clone(), Box::new(move || fq.with_lock(|q| q.nb_remaining() == 0)) as Box<dyn Fn() -> bool + Send>)
                }),
                crate::packet::MediaKind::Subtitle => self.subtitle.as_ref().map(|s| {
                    let fq = s.frameq.clone();
                    (s.pktq.clone(), s.finished.clone(), Box::new(move || fq.with_lock(|q| q.nb_remaining() == 0)) as Box<dyn Fn() -> bool + Send>)
                }),
            };
            if let Some((pktq, finished, frame_queue_empty)) = parts {
                out.push(OpenedStream { info: info.clone(), pktq, finished, frame_queue_empty });
            }
        }
        out
    }

    /// Spawn the reader thread over `demuxer` and the already-opened decoders.
    pub fn start_reader<D: Demuxer + 'static>(&mut self, demuxer: D) {
        let streams = self.opened_streams(&demuxer);
        self.controller.set_byte_seeking(self.config.byte_seek.resolve(demuxer.prefers_byte_seek()));
        let reader = Reader::new(demuxer, streams, self.config.clone(), self.controller.clone(), self.clocks.clone());
        let handle = std::thread::Builder::new()
            .name("reader".to_string())
            .spawn(move || reader.run())
            .expect("spawn reader");
        self.reader_handle = Some(handle);
    }

    /// Drive the audio sink's pull callback from the audio frame queue.
    pub fn start_audio_sink(&mut self, mut sink: Box<dyn AudioSink>, wanted: AudioSpec) -> crate::error::Result<()> {
        let Some(audio) = &self.audio else {
            return Err(crate::error::PlaybackError::Fatal("no audio stream opened".to_string()));
        };
        let negotiated = sink.open(wanted)?;
        let mut renderer = crate::audio_render::AudioRenderer::new(
            audio.frameq.clone(),
            self.clocks.clone(),
            self.controller.clone(),
            negotiated.sample_rate,
            negotiated.channels,
            4096,
        );
        sink.start(Box::new(move |buffer: &mut [f32]| {
            renderer.fill(buffer, std::time::Instant::now());
        }))?;
        self.audio_sink = Some(sink);
        Ok(())
    }

    /// Run the video refresh scheduler and event pump on the calling thread
    /// until quit or EOF+autoexit. Returns once the engine is torn down.
    pub fn run_foreground(&mut self, mut video_sink: Box<dyn VideoSink>) -> StatusSnapshot {
        let mut refresh = VideoRefresh::new(
            self.video.as_ref().map(|v| v.frameq.clone()),
            self.subtitle.as_ref().map(|s| s.frameq.clone()),
            self.config.show_mode,
            self.config.framedrop,
        );
        let mut last_stats_log = std::time::Instant::now();
        let mut last_input_activity = std::time::Instant::now();
        let mut controls_hidden = false;

        loop {
            if self.controller.is_aborted() {
                break;
            }
            let mut terminal = false;
            let events = video_sink.poll_events();
            if !events.is_empty() {
                last_input_activity = std::time::Instant::now();
                controls_hidden = false;
            }
            for event in events {
                if self.controller.apply_input_event(event, &self.clocks) {
                    terminal = true;
                }
            }
            if terminal {
                break;
            }
            if !controls_hidden && last_input_activity.elapsed() >= crate::config::CURSOR_HIDE_DELAY {
                video_sink.post_user_event(crate::sinks::UserEvent::HideControls);
                controls_hidden = true;
            }
            let sleep_for = refresh.tick(&self.clocks, video_sink.as_mut());
            if self.config.adaptive_external_clock && self.clocks.master_id() == ClockId::External {
                let fill_frac = self.estimate_queue_fill_fraction();
                self.clocks.update_external_clock_speed(fill_frac);
            }
            if self.config.stats && last_stats_log.elapsed() >= crate::config::STATS_LOG_INTERVAL {
                self.log_stats(&refresh);
                last_stats_log = std::time::Instant::now();
            }
            std::thread::sleep(sleep_for.min(crate::config::REFRESH_RATE));
        }

        self.teardown();
        let mut status = self.status.lock().unwrap();
        status.end_reason = self.controller.end_reason();
        status.frame_drops_late = refresh.stats.frame_drops_late;
        status.snapshot()
    }

    /// `-stats`: one structured line per tick interval in place of ffplay's
    /// carriage-return status line, since this engine has no terminal cursor
    /// to overwrite.
    fn log_stats(&self, refresh: &VideoRefresh) {
        let av_diff = self.clocks.video.read() - self.clocks.audio.read();
        tracing::info!(
            audio_queue_bytes = self.audio.as_ref().map(|a| a.pktq.size()),
            video_queue_bytes = self.video.as_ref().map(|v| v.pktq.size()),
            av_diff_seconds = if av_diff.is_nan() { None } else { Some(av_diff) },
            frame_drops_late = refresh.stats.frame_drops_late,
            "playback stats"
        );
    }

    fn estimate_queue_fill_fraction(&self) -> f64 {
        let cap = crate::config::MAX_QUEUE_SIZE as f64;
        let used: usize = [self.audio.as_ref().map(|a| a.pktq.size()), self.video.as_ref().map(|v| v.pktq.size())]
            .into_iter()
            .flatten()
            .sum();
        (used as f64 / cap).clamp(0.0, 1.0)
    }

    /// §5 teardown: abort propagates to every queue, audio sink pauses
    /// before its decoder joins, decoders join before the reader.
    fn teardown(&mut self) {
        self.controller.request_abort();
        if let Some(audio) = &self.audio {
            audio.pktq.abort();
            audio.frameq.signal();
        }
        if let Some(video) = &self.video {
            video.pktq.abort();
            video.frameq.signal();
        }
        if let Some(sub) = &self.subtitle {
            sub.pktq.abort();
            sub.frameq.signal();
        }
        if let Some(sink) = &mut self.audio_sink {
            sink.pause(true);
        }
        if let Some(a) = &mut self.audio {
            if let Some(h) = a.decoder_handle.take() {
                let _ = h.join();
            }
        }
        if let Some(v) = &mut self.video {
            if let Some(h) = v.decoder_handle.take() {
                let _ = h.join();
            }
        }
        if let Some(s) = &mut self.subtitle {
            if let Some(h) = s.decoder_handle.take() {
                let _ = h.join();
            }
        }
        if let Some(h) = self.reader_handle.take() {
            let _ = h.join();
        }
    }
}
