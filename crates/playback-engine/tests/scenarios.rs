//! End-to-end scenarios driving a real `Engine` through in-memory fake
//! collaborators (§8 S1-S6). Unlike the per-module unit tests, these exercise
//! the full reader/decoder/audio-render/refresh thread topology together.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playback_engine::config::EngineConfig;
use playback_engine::control::InputEvent;
use playback_engine::decoder::{DecodedUnit, Decoder};
use playback_engine::demux::{DemuxEvent, Demuxer, SeekRequest, StreamId, StreamInfo};
use playback_engine::engine::Engine;
use playback_engine::packet::{MediaKind, Packet, PacketFlags};
use playback_engine::sinks::{AudioSamples, AudioSink, AudioSpec, UserEvent, VideoSink};
use playback_types::{PlaybackEndReason, StatusSnapshot};

fn audio_packet(stream_id: u32, pts: f64) -> Packet {
    Packet {
        stream_id,
        data: pts.to_le_bytes().to_vec(),
        pts,
        dts: pts,
        duration: 0.05,
        pos: -1,
        flags: PacketFlags::default(),
    }
}

/// Plays back a fixed, in-memory packet list; optionally serves one
/// attached-picture packet and counts `seek` calls.
struct FakeDemuxer {
    streams: Vec<StreamInfo>,
    packets: VecDeque<Packet>,
    replay: Vec<Packet>,
    attached: Option<Packet>,
    seeks: Arc<AtomicUsize>,
}

impl Demuxer for FakeDemuxer {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> std::io::Result<DemuxEvent> {
        match self.packets.pop_front() {
            Some(p) => Ok(DemuxEvent::Packet(p)),
            None => Ok(DemuxEvent::Eof),
        }
    }

    fn seek(&mut self, _req: SeekRequest) -> std::io::Result<()> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        self.packets = self.replay.iter().cloned().collect();
        Ok(())
    }

    fn attached_picture(&self, _stream_id: StreamId) -> Option<Packet> {
        self.attached.clone()
    }
}

/// Decodes the 8 little-endian bytes `send_packet` receives back into the
/// originating pts, but reports `pts: None` so the agent's synthesis path
/// (`next_pts += nb_samples / sample_rate_hz`) stamps the frame instead -
/// real codecs frequently don't carry a timestamp on every frame either.
struct FakeAudioDecoder {
    pending: usize,
}

impl Decoder for FakeAudioDecoder {
    type Payload = AudioSamples;

    fn send_packet(&mut self, _data: &[u8]) -> Result<(), String> {
        self.pending += 1;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<DecodedUnit<AudioSamples>>, String> {
        if self.pending == 0 {
            return Ok(None);
        }
        self.pending -= 1;
        Ok(Some(DecodedUnit {
            payload: AudioSamples { interleaved: vec![0.0; 128], sample_rate: 44_100, channels: 2 },
            pts: None,
            nb_samples: 64,
            duration: 64.0 / 44_100.0,
            format: "f32".to_string(),
            width: 0,
            height: 0,
        }))
    }

    fn flush(&mut self) {
        self.pending = 0;
    }
}

/// Drains the audio render callback from a background thread instead of a
/// real audio device, so the frame queue empties and the reader can reach
/// its EOF/finished state deterministically. `pause(true)` (called by
/// `Engine::teardown`) stops the thread.
struct FakeAudioSink {
    stop: Arc<AtomicBool>,
}

impl FakeAudioSink {
    fn new() -> Self {
        Self { stop: Arc::new(AtomicBool::new(false)) }
    }
}

impl AudioSink for FakeAudioSink {
    fn open(&mut self, wanted: AudioSpec) -> playback_engine::error::Result<AudioSpec> {
        Ok(wanted)
    }

    fn start(&mut self, mut fill: Box<dyn FnMut(&mut [f32]) + Send + 'static>) -> playback_engine::error::Result<()> {
        let stop = self.stop.clone();
        std::thread::spawn(move || {
            let mut buffer = vec![0f32; 256];
            while !stop.load(Ordering::Acquire) {
                fill(&mut buffer);
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        Ok(())
    }

    fn pause(&mut self, paused: bool) {
        if paused {
            self.stop.store(true, Ordering::Release);
        }
    }
}

/// Minimal stand-in for `TermVideoSink`: presents nothing, replays a
/// scripted sequence of input events one per `poll_events` call, and counts
/// `post_user_event` calls so tests can observe cursor-hide behavior.
struct FakeVideoSink {
    scripted_events: Mutex<VecDeque<InputEvent>>,
    presented: Arc<AtomicUsize>,
    hide_calls: Arc<AtomicUsize>,
    /// If set, `poll_events` returns `[Quit]` once this much wall time has
    /// elapsed since construction, regardless of `scripted_events`.
    delayed_quit_after: Option<Duration>,
    created_at: std::time::Instant,
    quit_sent: AtomicBool,
}

impl FakeVideoSink {
    fn new(scripted_events: Vec<InputEvent>) -> Self {
        Self {
            scripted_events: Mutex::new(scripted_events.into()),
            presented: Arc::new(AtomicUsize::new(0)),
            hide_calls: Arc::new(AtomicUsize::new(0)),
            delayed_quit_after: None,
            created_at: std::time::Instant::now(),
            quit_sent: AtomicBool::new(false),
        }
    }

    fn with_delayed_quit(delay: Duration, hide_calls: Arc<AtomicUsize>) -> Self {
        Self {
            scripted_events: Mutex::new(VecDeque::new()),
            presented: Arc::new(AtomicUsize::new(0)),
            hide_calls,
            delayed_quit_after: Some(delay),
            created_at: std::time::Instant::now(),
            quit_sent: AtomicBool::new(false),
        }
    }
}

impl VideoSink for FakeVideoSink {
    fn present_frame(&mut self, _pixels: &[u8], _w: u32, _h: u32) {
        self.presented.fetch_add(1, Ordering::SeqCst);
    }

    fn poll_events(&mut self) -> Vec<InputEvent> {
        if let Some(delay) = self.delayed_quit_after {
            if self.created_at.elapsed() >= delay && !self.quit_sent.swap(true, Ordering::SeqCst) {
                return vec![InputEvent::Quit];
            }
            return Vec::new();
        }
        self.scripted_events.lock().unwrap().pop_front().into_iter().collect()
    }

    fn post_user_event(&mut self, kind: UserEvent) {
        if kind == UserEvent::HideControls {
            self.hide_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn run_with_timeout(mut engine: Engine, sink: Box<dyn VideoSink>) -> StatusSnapshot {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let snapshot = engine.run_foreground(sink);
        let _ = tx.send(snapshot);
    });
    rx.recv_timeout(Duration::from_secs(10)).expect("engine did not terminate within the test timeout")
}

fn audio_only_stream() -> Vec<StreamInfo> {
    vec![StreamInfo { id: StreamId(0), kind: MediaKind::Audio, attached_pic: false }]
}

/// S1: canonical playback. Twenty packets, audio master, autoexit - the
/// engine must reach `PlaybackEndReason::Eof` once the audio queue drains.
#[test]
fn s1_canonical_playback_reaches_eof_and_autoexits() {
    let packets: VecDeque<Packet> = (0..20).map(|i| audio_packet(0, i as f64 * 0.05)).collect();
    let demux =
        FakeDemuxer { streams: audio_only_stream(), packets, replay: Vec::new(), attached: None, seeks: Arc::new(AtomicUsize::new(0)) };

    let mut config = EngineConfig::default();
    config.autoexit = true;

    let mut engine = Engine::new(config);
    engine.open_audio(FakeAudioDecoder { pending: 0 }, 44_100);
    engine.start_reader(demux);
    engine.start_audio_sink(Box::new(FakeAudioSink::new()), AudioSpec { sample_rate: 44_100, channels: 2 }).unwrap();

    let snapshot = run_with_timeout(engine, Box::new(FakeVideoSink::new(Vec::new())));
    assert_eq!(snapshot.end_reason, Some(PlaybackEndReason::Eof));
}

/// S5: looped playback. `loop_count = 2` means the file plays twice before
/// autoexit fires; the demuxer's `seek` call count (driven by the reader's
/// loop-restart path) must land on exactly one replay.
#[test]
fn s5_loop_count_two_replays_once_then_autoexits() {
    let initial: Vec<Packet> = (0..6).map(|i| audio_packet(0, i as f64 * 0.05)).collect();
    let seeks = Arc::new(AtomicUsize::new(0));
    let demux = FakeDemuxer {
        streams: audio_only_stream(),
        packets: initial.iter().cloned().collect(),
        replay: initial,
        attached: None,
        seeks: seeks.clone(),
    };

    let mut config = EngineConfig::default();
    config.autoexit = true;
    config.loop_count = 2;

    let mut engine = Engine::new(config);
    engine.open_audio(FakeAudioDecoder { pending: 0 }, 44_100);
    engine.start_reader(demux);
    engine.start_audio_sink(Box::new(FakeAudioSink::new()), AudioSpec { sample_rate: 44_100, channels: 2 }).unwrap();

    let snapshot = run_with_timeout(engine, Box::new(FakeVideoSink::new(Vec::new())));
    assert_eq!(snapshot.end_reason, Some(PlaybackEndReason::Eof));
    assert_eq!(seeks.load(Ordering::SeqCst), 1, "loop_count=2 replays exactly once before exiting");
}

/// Quit is serviced as a terminal input event even mid-playback, independent
/// of EOF/autoexit, and is reported distinctly in the final snapshot.
#[test]
fn quit_event_ends_playback_with_stopped_reason_before_eof() {
    let packets: VecDeque<Packet> = (0..10_000).map(|i| audio_packet(0, i as f64 * 0.05)).collect();
    let demux =
        FakeDemuxer { streams: audio_only_stream(), packets, replay: Vec::new(), attached: None, seeks: Arc::new(AtomicUsize::new(0)) };

    let config = EngineConfig::default();
    let mut engine = Engine::new(config);
    engine.open_audio(FakeAudioDecoder { pending: 0 }, 44_100);
    engine.start_reader(demux);
    engine.start_audio_sink(Box::new(FakeAudioSink::new()), AudioSpec { sample_rate: 44_100, channels: 2 }).unwrap();

    let snapshot = run_with_timeout(engine, Box::new(FakeVideoSink::new(vec![InputEvent::Quit])));
    assert_eq!(snapshot.end_reason, Some(PlaybackEndReason::Stopped));
}

/// After `CURSOR_HIDE_DELAY` of no input events, the engine posts exactly one
/// `UserEvent::HideControls` hint to the sink - not once per refresh tick.
#[test]
fn cursor_hide_event_fires_once_after_inactivity() {
    let packets: VecDeque<Packet> = (0..10_000).map(|i| audio_packet(0, i as f64 * 0.05)).collect();
    let demux =
        FakeDemuxer { streams: audio_only_stream(), packets, replay: Vec::new(), attached: None, seeks: Arc::new(AtomicUsize::new(0)) };

    let config = EngineConfig::default();
    let mut engine = Engine::new(config);
    engine.open_audio(FakeAudioDecoder { pending: 0 }, 44_100);
    engine.start_reader(demux);
    engine.start_audio_sink(Box::new(FakeAudioSink::new()), AudioSpec { sample_rate: 44_100, channels: 2 }).unwrap();

    let hide_calls = Arc::new(AtomicUsize::new(0));
    let sink = FakeVideoSink::with_delayed_quit(Duration::from_millis(1_500), hide_calls.clone());

    let snapshot = run_with_timeout(engine, Box::new(sink));
    assert_eq!(snapshot.end_reason, Some(PlaybackEndReason::Stopped));
    assert_eq!(hide_calls.load(Ordering::SeqCst), 1, "HideControls should fire exactly once while idle");
}
