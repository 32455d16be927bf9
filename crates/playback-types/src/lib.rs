//! Shared wire types for the playback engine.
//!
//! These are the types that cross the boundary between the engine and its
//! front ends (CLI, status readers): commands, status snapshots, and the
//! error taxonomy. Packet/Frame/Clock live in `playback-engine` itself since
//! nothing outside the engine needs to name them.

use serde::{Deserialize, Serialize};

/// Preferred master clock, selectable from the CLI.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Audio,
    Video,
    Ext,
}

/// Byte-seek preference (`-bytes` CLI option).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByteSeekMode {
    #[default]
    Auto,
    Off,
    On,
}

impl ByteSeekMode {
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => ByteSeekMode::Off,
            1 => ByteSeekMode::On,
            _ => ByteSeekMode::Auto,
        }
    }

    /// Resolve `Auto` against the demuxer's own `prefers_byte_seek` hint
    /// ("-1 = auto by format flag" per §6); `Off`/`On` are authoritative.
    pub fn resolve(self, format_prefers_bytes: bool) -> bool {
        match self {
            ByteSeekMode::Off => false,
            ByteSeekMode::On => true,
            ByteSeekMode::Auto => format_prefers_bytes,
        }
    }
}

/// Framedrop preference (`-framedrop` CLI option).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameDropMode {
    Off,
    #[default]
    Auto,
    Forced,
}

impl FrameDropMode {
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => FrameDropMode::Off,
            1 => FrameDropMode::Forced,
            _ => FrameDropMode::Auto,
        }
    }
}

/// Audio-visualization mode, recovered from the original `show_mode`.
///
/// `Waves` only affects the refresh scheduler's repaint cadence; no FFT/DSP
/// visualization is implemented.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShowMode {
    #[default]
    None,
    Video,
    Waves,
}

/// Reason playback of the current item ended.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    Eof,
    Error,
    Stopped,
}

/// A best-effort, point-in-time snapshot of engine state for UIs/logging.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub now_playing: Option<String>,
    pub paused: bool,
    pub elapsed_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub source_codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub device: Option<String>,
    pub volume_percent: u8,
    pub muted: bool,
    pub underrun_events: u64,
    pub frame_drops_late: u64,
    pub av_diff_seconds: Option<f64>,
    pub end_reason: Option<PlaybackEndReason>,
}

/// User/control-plane commands accepted by the engine, independent of how
/// they were produced (keyboard, remote control, scripted test).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    TogglePause,
    VolumeUp,
    VolumeDown,
    SeekRelative(f64),
    Quit,
    CycleStream,
    Resize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_seek_mode_from_i32_maps_known_values() {
        assert_eq!(ByteSeekMode::from_i32(0), ByteSeekMode::Off);
        assert_eq!(ByteSeekMode::from_i32(1), ByteSeekMode::On);
        assert_eq!(ByteSeekMode::from_i32(-1), ByteSeekMode::Auto);
        assert_eq!(ByteSeekMode::from_i32(42), ByteSeekMode::Auto);
    }

    #[test]
    fn byte_seek_mode_resolve_defers_to_format_hint_only_when_auto() {
        assert!(!ByteSeekMode::Off.resolve(true));
        assert!(ByteSeekMode::On.resolve(false));
        assert!(ByteSeekMode::Auto.resolve(true));
        assert!(!ByteSeekMode::Auto.resolve(false));
    }

    #[test]
    fn frame_drop_mode_from_i32_maps_known_values() {
        assert_eq!(FrameDropMode::from_i32(0), FrameDropMode::Off);
        assert_eq!(FrameDropMode::from_i32(1), FrameDropMode::Forced);
        assert_eq!(FrameDropMode::from_i32(-1), FrameDropMode::Auto);
    }
}
