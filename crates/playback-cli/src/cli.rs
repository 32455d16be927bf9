//! Command-line interface definitions.
//!
//! This module contains the `clap`-powered CLI surface area (args + defaults)
//! and nothing else, so the rest of the crate can stay reusable. Field-for-
//! field mirrors `playback_engine::config::EngineConfig` plus the positional
//! input file (§6's option table).

use std::path::PathBuf;

use clap::Parser;
use playback_engine::config::EngineConfig;
use playback_types::{ByteSeekMode, FrameDropMode, ShowMode, SyncMode};

#[derive(Parser, Debug)]
#[command(name = "playback", about = "Play one media file with synchronized A/V presentation.")]
pub struct Args {
    /// Path to the media file to play.
    pub path: PathBuf,

    /// Master clock selection: audio|video|ext.
    #[arg(long, default_value = "audio")]
    pub sync: String,

    /// Start offset in seconds.
    #[arg(long = "ss", default_value_t = 0.0)]
    pub start_seconds: f64,

    /// Play duration cap in seconds.
    #[arg(long = "t")]
    pub duration_seconds: Option<f64>,

    /// Byte-seek mode: -1 = auto by format flag, 0 = off, 1 = on.
    #[arg(long = "bytes", default_value_t = -1)]
    pub bytes: i32,

    /// Set the codec fast flag.
    #[arg(long)]
    pub fast: bool,

    /// Ask the demuxer to generate PTS.
    #[arg(long)]
    pub genpts: bool,

    /// Framedrop: -1 = auto, 0 = off, 1 = forced.
    #[arg(long = "drp", default_value_t = -1)]
    pub drp: i32,

    /// Disable the packet-queue size cap.
    #[arg(long)]
    pub infbuf: bool,

    /// Replay count, 0 = forever.
    #[arg(long = "loop", default_value_t = 1)]
    pub loop_count: u32,

    /// Exit on EOF instead of idling.
    #[arg(long)]
    pub autoexit: bool,

    /// Initial volume, 0..100.
    #[arg(long, default_value_t = 100)]
    pub volume: u8,

    /// Output device, matched by substring.
    #[arg(long)]
    pub device: Option<String>,

    /// tracing `EnvFilter` string.
    #[arg(long, default_value = "info,playback=info")]
    pub log_filter: String,

    /// Periodically log a structured playback-stats line.
    #[arg(long = "stats")]
    pub stats: bool,

    /// List output devices and exit.
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    pub fn to_engine_config(&self) -> EngineConfig {
        let sync = match self.sync.as_str() {
            "video" => SyncMode::Video,
            "ext" | "external" => SyncMode::Ext,
            _ => SyncMode::Audio,
        };
        EngineConfig {
            sync,
            start_seconds: self.start_seconds,
            duration_seconds: self.duration_seconds,
            byte_seek: ByteSeekMode::from_i32(self.bytes),
            fast: self.fast,
            disable_video_reorder: false,
            genpts: self.genpts,
            framedrop: FrameDropMode::from_i32(self.drp),
            infinite_buffer: self.infbuf,
            loop_count: self.loop_count,
            autoexit: self.autoexit,
            initial_volume_percent: self.volume.min(100),
            show_mode: ShowMode::Video,
            adaptive_external_clock: true,
            log_filter: self.log_filter.clone(),
            stats: self.stats,
            device_name: self.device.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_string_maps_to_clock_preference() {
        let mut args = Args::try_parse_from(["playback", "f.flac"]).unwrap();
        assert_eq!(args.to_engine_config().sync, SyncMode::Audio);
        args.sync = "video".to_string();
        assert_eq!(args.to_engine_config().sync, SyncMode::Video);
        args.sync = "ext".to_string();
        assert_eq!(args.to_engine_config().sync, SyncMode::Ext);
    }

    #[test]
    fn volume_clamps_at_100() {
        let mut args = Args::try_parse_from(["playback", "f.flac"]).unwrap();
        args.volume = 250;
        assert_eq!(args.to_engine_config().initial_volume_percent, 100);
    }
}
