//! Video refresh scheduler (§4.5): presentation timing, frame drop, and
//! subtitle overlay advance, driven by a ~100Hz main-thread tick.

use std::sync::Arc;
use std::time::Instant;

use playback_types::{FrameDropMode, ShowMode};

use crate::clock::{ClockId, Clocks};
use crate::config::{DEFAULT_RDFT_SPEED_HZ, MAX_FRAME_DURATION_CONTINUOUS};
use crate::frame::SharedFrameQueue;
use crate::sinks::{SubtitlePicture, VideoPicture, VideoSink};
use crate::sync::{compute_target_delay, frame_duration};

pub struct RefreshStats {
    pub frame_drops_late: u64,
}

impl Default for RefreshStats {
    fn default() -> Self {
        Self { frame_drops_late: 0 }
    }
}

/// Owns the scheduling state that persists across ticks: `frame_timer`,
/// `force_refresh`, and the last wave-repaint time for show-mode audio
/// visualization.
pub struct VideoRefresh {
    pictureq: Option<Arc<SharedFrameQueue<VideoPicture>>>,
    subq: Option<Arc<SharedFrameQueue<SubtitlePicture>>>,
    frame_timer: f64,
    force_refresh: bool,
    show_mode: ShowMode,
    framedrop: FrameDropMode,
    last_wave_repaint: Option<Instant>,
    started_at: Instant,
    pub stats: RefreshStats,
}

impl VideoRefresh {
    pub fn new(
        pictureq: Option<Arc<SharedFrameQueue<VideoPicture>>>,
        subq: Option<Arc<SharedFrameQueue<SubtitlePicture>>>,
        show_mode: ShowMode,
        framedrop: FrameDropMode,
    ) -> Self {
        Self {
            pictureq,
            subq,
            frame_timer: 0.0,
            force_refresh: true,
            show_mode,
            framedrop,
            last_wave_repaint: None,
            started_at: Instant::now(),
            stats: RefreshStats::default(),
        }
    }

    fn now_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Run one scheduler tick. Returns the time to sleep before the next one.
    pub fn tick(&mut self, clocks: &Clocks, sink: &mut dyn VideoSink) -> std::time::Duration {
        let mut remaining = crate::config::REFRESH_RATE.as_secs_f64();

        if self.show_mode == ShowMode::Waves {
            let due = match self.last_wave_repaint {
                None => true,
                Some(t) => t.elapsed().as_secs_f64() >= 1.0 / DEFAULT_RDFT_SPEED_HZ,
            };
            if due {
                sink.present_frame(&[], 0, 0);
                self.last_wave_repaint = Some(Instant::now());
            }
            remaining = remaining.min(1.0 / DEFAULT_RDFT_SPEED_HZ);
        }

        if let Some(pictureq) = self.pictureq.clone() {
            remaining = remaining.min(self.advance_video(&pictureq, clocks, sink));
        }

        if self.force_refresh {
            if let Some(pictureq) = &self.pictureq {
                pictureq.with_lock(|fq| {
                    if let Some(last) = fq.peek_last() {
                        sink.present_frame(&last.payload.pixels, last.payload.width, last.payload.height);
                    }
                });
            }
            self.force_refresh = false;
        }

        std::time::Duration::from_secs_f64(remaining.max(0.0))
    }

    fn advance_video(
        &mut self,
        pictureq: &Arc<SharedFrameQueue<VideoPicture>>,
        clocks: &Clocks,
        sink: &mut dyn VideoSink,
    ) -> f64 {
        loop {
            if pictureq.with_lock(|fq| fq.is_aborted()) {
                return crate::config::REFRESH_RATE.as_secs_f64();
            }

            let (vp_pts, vp_serial, vp_dur, pktq_serial, empty) = pictureq.with_lock(|fq| {
                let current_serial = fq.pktq_serial();
                match fq.peek() {
                    Some(f) => (f.pts, f.serial, f.duration, current_serial, false),
                    None => (0.0, 0, 0.0, current_serial, true),
                }
            });
            if empty {
                return crate::config::REFRESH_RATE.as_secs_f64();
            }
            // §4.5 step 2: a picture whose serial lags the packet queue's
            // current one belongs to a generation a flush already retired;
            // drop it without presenting and look at the next one.
            if vp_serial != pktq_serial {
                pictureq.next();
                continue;
            }

            let (last_pts, last_serial, last_dur) = pictureq.with_lock(|fq| match fq.peek_last() {
                Some(l) => (l.pts, l.serial, l.duration),
                None => (vp_pts, vp_serial, vp_dur),
            });

            if last_serial != vp_serial {
                self.frame_timer = self.now_secs();
            }

            let last_duration = frame_duration(
                last_pts,
                last_dur,
                last_serial,
                vp_pts,
                vp_serial,
                MAX_FRAME_DURATION_CONTINUOUS,
            );

            let master = clocks.master_value();
            let video_is_master = clocks.master_id() == ClockId::Video;
            let delay = if video_is_master {
                last_duration
            } else {
                compute_target_delay(last_duration, clocks.video.read(), master, MAX_FRAME_DURATION_CONTINUOUS)
            };

            let now = self.now_secs();
            if now < self.frame_timer + delay {
                return (self.frame_timer + delay - now).max(0.0);
            }

            self.frame_timer += delay;
            if delay > 0.0 && now - self.frame_timer > crate::sync::AV_SYNC_THRESHOLD_MAX {
                self.frame_timer = now;
            }

            clocks.video.serial_ref().set(vp_serial);
            clocks.video.set(vp_pts, vp_serial);
            crate::clock::sync_clock_to_slave(&clocks.external, &clocks.video);

            let should_drop = match self.framedrop {
                FrameDropMode::Off => false,
                FrameDropMode::Forced => true,
                FrameDropMode::Auto => !video_is_master,
            };

            let has_next = pictureq.with_lock(|fq| fq.nb_remaining() > 1);
            if has_next && should_drop {
                let next_duration = pictureq.with_lock(|fq| {
                    let next = fq.peek_next();
                    next.map(|n| frame_duration(vp_pts, vp_dur, vp_serial, n.pts, n.serial, MAX_FRAME_DURATION_CONTINUOUS))
                        .unwrap_or(vp_dur)
                });
                if now > self.frame_timer + next_duration {
                    self.stats.frame_drops_late += 1;
                    pictureq.next();
                    continue;
                }
            }

            self.advance_subtitles(clocks);
            pictureq.next();
            self.force_refresh = true;
            return 0.0;
        }
    }

    /// Drop subtitles whose display window has elapsed, or that a newer
    /// subtitle already on the queue has superseded (its own window started
    /// before the video clock caught up to it).
    fn advance_subtitles(&mut self, clocks: &Clocks) {
        let Some(subq) = self.subq.clone() else { return };
        let vidclk = clocks.video.read();
        loop {
            let drop = subq.with_lock(|fq| {
                let Some(cur) = fq.peek() else { return false };
                if cur.pts + cur.payload.end_display_time < vidclk {
                    return true;
                }
                fq.peek_next().map(|next| next.pts + next.payload.start_display_time < vidclk).unwrap_or(false)
            });
            if drop {
                subq.next();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockId, SerialRef};
    use crate::frame::Frame;
    use crate::packet_queue::PacketQueue;

    struct NullSink;
    impl VideoSink for NullSink {
        fn present_frame(&mut self, _pixels: &[u8], _w: u32, _h: u32) {}
        fn poll_events(&mut self) -> Vec<crate::control::InputEvent> {
            Vec::new()
        }
        fn post_user_event(&mut self, _kind: crate::sinks::UserEvent) {}
    }

    #[test]
    fn tick_presents_single_queued_frame_eventually() {
        let pktq = PacketQueue::new();
        pktq.start();
        let pictureq = SharedFrameQueue::new(3, true, pktq.clone());
        pictureq.push_blocking(Frame::new(VideoPicture { pixels: vec![1, 2, 3], width: 1, height: 1 }, 0.0, 0.04, 1));

        let clocks = Clocks::new(SerialRef::new(), SerialRef::new(), false, true, ClockId::Video);
        clocks.video.serial_ref().set(1);
        let mut refresh = VideoRefresh::new(Some(pictureq.clone()), None, ShowMode::Video, FrameDropMode::Auto);
        let mut sink = NullSink;

        for _ in 0..5 {
            refresh.tick(&clocks, &mut sink);
        }
        assert!((clocks.video.read() - 0.0).abs() < 1.0);
    }

    #[test]
    fn waves_mode_presents_without_a_picture_queue() {
        let clocks = Clocks::new(SerialRef::new(), SerialRef::new(), true, false, ClockId::Audio);
        let mut refresh = VideoRefresh::new(None, None, ShowMode::Waves, FrameDropMode::Auto);
        let mut sink = NullSink;
        let d = refresh.tick(&clocks, &mut sink);
        assert!(d <= crate::config::REFRESH_RATE);
    }

    #[test]
    fn advance_subtitles_drops_one_superseded_by_a_later_subtitle() {
        let pktq = PacketQueue::new();
        pktq.start();
        let subq = SharedFrameQueue::new(16, false, pktq.clone());
        let mut old = SubtitlePicture::default();
        old.start_display_time = 0.0;
        old.end_display_time = 100.0;
        let mut newer = SubtitlePicture::default();
        newer.start_display_time = 0.0;
        newer.end_display_time = 100.0;
        subq.push_blocking(Frame::new(old, 1.0, 5.0, 1));
        subq.push_blocking(Frame::new(newer, 3.0, 5.0, 1));

        let clocks = Clocks::new(SerialRef::new(), SerialRef::new(), false, true, ClockId::Video);
        clocks.video.serial_ref().set(1);
        clocks.video.set(3.0, 1);

        let mut refresh = VideoRefresh::new(None, Some(subq.clone()), ShowMode::Video, FrameDropMode::Auto);
        refresh.advance_subtitles(&clocks);

        subq.with_lock(|fq| {
            assert_eq!(fq.nb_remaining(), 1);
            assert!((fq.peek().unwrap().pts - 3.0).abs() < 1e-9);
        });
    }
}
