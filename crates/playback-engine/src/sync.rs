//! Master-selection-driven delay and compensation math (§4.3/§4.5/§4.6).
//!
//! Constants are taken verbatim from the original implementation's
//! `#define`s so the timing behavior this crate reproduces matches the
//! reference player exactly, not just "close enough".

pub const AV_SYNC_THRESHOLD_MIN: f64 = 0.04;
pub const AV_SYNC_THRESHOLD_MAX: f64 = 0.1;
pub const AV_SYNC_FRAMEDUP_THRESHOLD: f64 = 0.1;
pub const AV_NOSYNC_THRESHOLD: f64 = 10.0;
pub const SAMPLE_CORRECTION_PERCENT_MAX: f64 = 10.0;
pub const AUDIO_DIFF_AVG_NB: u32 = 20;

/// `exp(ln(0.01) / AUDIO_DIFF_AVG_NB)`, the EMA coefficient used by
/// `synchronize_audio`.
pub fn audio_diff_avg_coef() -> f64 {
    (0.01f64.ln() / AUDIO_DIFF_AVG_NB as f64).exp()
}

/// Delay adjustment for a video frame given how far the video clock has
/// drifted from the master clock. A no-op (`delay` passed through)
/// whenever video itself is master — callers should not invoke this in
/// that case, but it degrades harmlessly if they do (diff is computed
/// against `master_clock == vidclk`, so diff is 0).
pub fn compute_target_delay(delay: f64, vidclk: f64, master_clock: f64, max_frame_duration: f64) -> f64 {
    let diff = vidclk - master_clock;
    let sync_threshold = delay.clamp(AV_SYNC_THRESHOLD_MIN, AV_SYNC_THRESHOLD_MAX);

    if diff.is_nan() || diff.abs() >= max_frame_duration {
        return delay.max(0.0);
    }

    if diff <= -sync_threshold {
        (delay + diff).max(0.0)
    } else if diff >= sync_threshold && delay > AV_SYNC_FRAMEDUP_THRESHOLD {
        delay + diff
    } else if diff >= sync_threshold {
        2.0 * delay
    } else {
        delay
    }
}

/// Inter-frame duration used to feed `compute_target_delay`: `vp.pts -
/// lastvp.pts` when the two frames share a serial and the gap is sane,
/// otherwise the fallback `lastvp.duration`.
pub fn frame_duration(
    last_pts: f64,
    last_duration: f64,
    last_serial: u64,
    vp_pts: f64,
    vp_serial: u64,
    max_frame_duration: f64,
) -> f64 {
    if last_serial != vp_serial {
        return last_duration;
    }
    let d = vp_pts - last_pts;
    if d.is_nan() || d <= 0.0 || d > max_frame_duration {
        last_duration
    } else {
        d
    }
}

/// Running EMA state for `synchronize_audio`.
#[derive(Default)]
pub struct AudioDiffState {
    cum: f64,
    avg_count: u32,
}

impl AudioDiffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the wanted sample count towards the master clock. Returns
    /// `nb` unchanged while audio is master (callers should not call this
    /// then, but it's harmless) or during the EMA's warm-up period.
    ///
    /// `audio_diff_threshold` is `hw_buf_size / bytes_per_sec`.
    pub fn synchronize(
        &mut self,
        nb: usize,
        audclk: f64,
        master_clock: f64,
        src_freq: f64,
        audio_diff_threshold: f64,
    ) -> usize {
        let diff = audclk - master_clock;

        if diff.is_nan() || diff.abs() >= AV_NOSYNC_THRESHOLD {
            self.cum = 0.0;
            self.avg_count = 0;
            return nb;
        }

        let coef = audio_diff_avg_coef();
        self.cum = diff + coef * self.cum;

        if self.avg_count < AUDIO_DIFF_AVG_NB {
            self.avg_count += 1;
            return nb;
        }

        let avg = self.cum * (1.0 - coef);
        if avg.abs() < audio_diff_threshold {
            return nb;
        }

        let wanted = nb as f64 + (diff * src_freq).round();
        let lo = nb as f64 * (1.0 - SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
        let hi = nb as f64 * (1.0 + SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
        wanted.clamp(lo, hi).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_target_delay_shortens_when_video_behind() {
        let delay = compute_target_delay(0.04, 1.0, 1.2, 3600.0);
        assert!((delay - 0.0).abs() < 1e-9);
    }

    #[test]
    fn compute_target_delay_waits_when_video_ahead_and_frame_long() {
        let delay = compute_target_delay(0.2, 1.3, 1.0, 3600.0);
        assert!((delay - 0.5).abs() < 1e-9);
    }

    #[test]
    fn compute_target_delay_duplicates_when_video_ahead_and_frame_short() {
        let delay = compute_target_delay(0.04, 1.2, 1.0, 3600.0);
        assert!((delay - 0.08).abs() < 1e-9);
    }

    #[test]
    fn compute_target_delay_passthrough_when_diff_within_threshold() {
        let delay = compute_target_delay(0.04, 1.0, 1.0, 3600.0);
        assert_eq!(delay, 0.04);
    }

    #[test]
    fn synchronize_audio_never_exceeds_ten_percent_cap() {
        let mut st = AudioDiffState::new();
        // Drive the EMA past warm-up with a consistent large diff.
        for _ in 0..25 {
            st.synchronize(1000, 5.0, 0.0, 44_100.0, 0.01);
        }
        let out = st.synchronize(1000, 5.0, 0.0, 44_100.0, 0.01);
        assert!(out as f64 >= 900.0 && out as f64 <= 1100.0);
    }

    #[test]
    fn synchronize_audio_passthrough_during_warm_up() {
        let mut st = AudioDiffState::new();
        let out = st.synchronize(1000, 5.0, 0.0, 44_100.0, 0.01);
        assert_eq!(out, 1000);
    }

    #[test]
    fn synchronize_audio_resets_on_large_discontinuity() {
        let mut st = AudioDiffState::new();
        for _ in 0..25 {
            st.synchronize(1000, 5.0, 0.0, 44_100.0, 0.01);
        }
        let out = st.synchronize(1000, 50.0, 0.0, 44_100.0, 0.01);
        assert_eq!(out, 1000);
        assert_eq!(st.avg_count, 0);
    }
}
