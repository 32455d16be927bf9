//! Mutable status state the engine updates as it plays, and the
//! point-in-time snapshot built from it for UIs/logging (§6).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use playback_types::{PlaybackEndReason, StatusSnapshot};

#[derive(Debug, Default)]
pub struct PlayerStatusState {
    pub now_playing: Option<String>,
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub duration_ms: Option<u64>,
    pub source_codec: Option<String>,
    pub played_ms: Option<Arc<AtomicU64>>,
    pub paused_flag: Option<Arc<AtomicBool>>,
    pub volume_percent: u8,
    pub muted: bool,
    pub underrun_events: Option<Arc<AtomicU64>>,
    pub frame_drops_late: u64,
    pub av_diff_seconds: Option<f64>,
    pub end_reason: Option<PlaybackEndReason>,
}

impl PlayerStatusState {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let paused = self.paused_flag.as_ref().map(|p| p.load(Ordering::Relaxed)).unwrap_or(false);
        let elapsed_ms = self.played_ms.as_ref().map(|v| v.load(Ordering::Relaxed));
        StatusSnapshot {
            now_playing: self.now_playing.clone(),
            paused,
            elapsed_ms,
            duration_ms: self.duration_ms,
            source_codec: self.source_codec.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            device: self.device.clone(),
            volume_percent: self.volume_percent,
            muted: self.muted,
            underrun_events: self.underrun_events.as_ref().map(|v| v.load(Ordering::Relaxed)).unwrap_or(0),
            frame_drops_late: self.frame_drops_late,
            av_diff_seconds: self.av_diff_seconds,
            end_reason: self.end_reason,
        }
    }

    pub fn clear_playback(&mut self) {
        self.now_playing = None;
        self.sample_rate = None;
        self.channels = None;
        self.duration_ms = None;
        self.source_codec = None;
        self.played_ms = None;
        self.paused_flag = None;
        self.underrun_events = None;
        self.frame_drops_late = 0;
        self.av_diff_seconds = None;
        self.end_reason = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_zero_underruns_when_unset() {
        let state = PlayerStatusState::default();
        let snap = state.snapshot();
        assert_eq!(snap.underrun_events, 0);
        assert!(!snap.paused);
    }

    #[test]
    fn snapshot_reads_through_shared_counters() {
        let mut state = PlayerStatusState::default();
        let played = Arc::new(AtomicU64::new(1500));
        state.played_ms = Some(played.clone());
        state.sample_rate = Some(44_100);
        let snap = state.snapshot();
        assert_eq!(snap.elapsed_ms, Some(1500));
        played.store(2000, Ordering::Relaxed);
        assert_eq!(state.snapshot().elapsed_ms, Some(2000));
    }
}
