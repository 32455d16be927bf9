//! Engine configuration (§6's CLI option table, modeled data-first so the
//! CLI crate's `clap` struct can map onto it field-for-field).

use playback_types::{ByteSeekMode, FrameDropMode, ShowMode, SyncMode};

use crate::clock::ClockId;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// `sync`: master clock preference.
    pub sync: SyncMode,
    /// `ss`: start offset in seconds.
    pub start_seconds: f64,
    /// `t`: play duration cap in seconds, if any.
    pub duration_seconds: Option<f64>,
    /// `bytes`.
    pub byte_seek: ByteSeekMode,
    /// `fast`: set the codec fast flag (skip loop filter / less exact IDCT).
    /// Unrelated to `disable_video_reorder` below; §6 and §4.4 are two
    /// separate knobs in the original even though both gate on the video
    /// decoder.
    pub fast: bool,
    /// §4.4's "configured reorder policy": when set, the video decoder
    /// agent substitutes the packet's DTS for PTS instead of trusting the
    /// codec's own (possibly reordered) output timestamp. Not exposed on
    /// the CLI's option table (§6); left `false` unless a front end opts in.
    pub disable_video_reorder: bool,
    /// `genpts`: ask the demuxer to generate PTS.
    pub genpts: bool,
    /// `drp`.
    pub framedrop: FrameDropMode,
    /// `infbuf`: disable the packet-queue size cap.
    pub infinite_buffer: bool,
    /// `loop`: replay count, 0 = forever.
    pub loop_count: u32,
    /// `autoexit`: exit on EOF instead of idling.
    pub autoexit: bool,
    /// `volume`: initial volume, 0..100.
    pub initial_volume_percent: u8,
    pub show_mode: ShowMode,
    /// Gate for the external clock's adaptive speed nudging; see
    /// SPEC_FULL.md §9's Open Question decision.
    pub adaptive_external_clock: bool,
    pub log_filter: String,
    /// `-stats`: periodically log a structured playback-stats line.
    pub stats: bool,
    pub device_name: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync: SyncMode::Audio,
            start_seconds: 0.0,
            duration_seconds: None,
            byte_seek: ByteSeekMode::Auto,
            fast: false,
            disable_video_reorder: false,
            genpts: false,
            framedrop: FrameDropMode::Auto,
            infinite_buffer: false,
            loop_count: 1,
            autoexit: false,
            initial_volume_percent: 100,
            show_mode: ShowMode::None,
            adaptive_external_clock: true,
            log_filter: "info,playback=info".to_string(),
            stats: false,
            device_name: None,
        }
    }
}

impl EngineConfig {
    pub fn master_clock_id(&self) -> ClockId {
        match self.sync {
            SyncMode::Audio => ClockId::Audio,
            SyncMode::Video => ClockId::Video,
            SyncMode::Ext => ClockId::External,
        }
    }
}

/// Bounded-buffer cap in bytes (`MAX_QUEUE_SIZE`), used by the reader's
/// backpressure predicate unless `infinite_buffer` is set (§4.7 step 4).
pub const MAX_QUEUE_SIZE: usize = 15 * 1024 * 1024;

/// `MIN_FRAMES`: packet count threshold used alongside the duration check in
/// the backpressure predicate.
pub const MIN_FRAMES: usize = 25;

/// Ring-buffer capacities per stream kind (§3).
pub const VIDEO_QUEUE_SIZE: usize = 3;
pub const SUBTITLE_QUEUE_SIZE: usize = 16;
pub const AUDIO_QUEUE_SIZE: usize = 9;

pub const REFRESH_RATE: std::time::Duration = std::time::Duration::from_millis(10);
pub const CURSOR_HIDE_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
/// Interval between `-stats` log lines (SPEC_FULL.md §6).
pub const STATS_LOG_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
pub const DEFAULT_RDFT_SPEED_HZ: f64 = 50.0;

/// `max_frame_duration`: 10s for formats without continuous timestamps,
/// 3600s otherwise (§4.5). The engine doesn't currently distinguish input
/// formats at this layer, so it exposes both and lets the caller pick.
pub const MAX_FRAME_DURATION_DISCONTINUOUS: f64 = 10.0;
pub const MAX_FRAME_DURATION_CONTINUOUS: f64 = 3600.0;
