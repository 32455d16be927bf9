//! Seek/pause/volume/stream-cycle control plane (§4.8).
//!
//! Generalizes the session-guarded command pattern from the teacher's
//! control surface (one shared, lock-protected command state nudged by the
//! event thread and drained by the owning thread) down to the handful of
//! fields this engine's control plane actually needs.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

pub use playback_types::InputEvent;
use playback_types::PlaybackEndReason;

use crate::clock::Clocks;

pub const MIX_MAX: u8 = 100;
pub const VOLUME_STEP: u8 = MIX_MAX / 50;

#[derive(Clone, Copy, Debug)]
pub struct PendingSeek {
    pub rel_seconds: f64,
    pub by_bytes: bool,
}

/// Shared control state: the reader/refresh/audio threads poll this, the
/// event-pump thread (or a test driver) mutates it. No single field's write
/// needs to be atomic with another's — each is read independently at the
/// point it matters, matching §5's "single integer, relaxed atomic" policy
/// for volume and the reader's own seek-request coalescing for seeks.
pub struct Controller {
    abort_request: AtomicBool,
    paused: AtomicBool,
    volume_percent: AtomicU8,
    muted: AtomicBool,
    seek: Mutex<Option<PendingSeek>>,
    queue_attachments_req: AtomicBool,
    cycle_stream_req: AtomicBool,
    continue_read: Mutex<()>,
    continue_read_cv: Condvar,
    /// Resolved `ByteSeekMode` (§6 `-bytes`): whether a keyboard-driven
    /// relative seek should be byte-proportional rather than time-based.
    /// `Auto` is resolved against the demuxer's format hint once the input
    /// is opened; see `set_byte_seeking`.
    byte_seeking: AtomicBool,
    /// `0` = unset, `1` = Eof, `2` = Error, `3` = Stopped. Set by whichever
    /// agent triggers `request_abort` so `run_foreground` can report why
    /// playback ended in the final `StatusSnapshot`.
    end_reason: AtomicU8,
}

impl Controller {
    pub fn new(initial_volume_percent: u8) -> Self {
        Self {
            abort_request: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            volume_percent: AtomicU8::new(initial_volume_percent.min(MIX_MAX)),
            muted: AtomicBool::new(false),
            seek: Mutex::new(None),
            queue_attachments_req: AtomicBool::new(true),
            cycle_stream_req: AtomicBool::new(false),
            continue_read: Mutex::new(()),
            continue_read_cv: Condvar::new(),
            byte_seeking: AtomicBool::new(false),
            end_reason: AtomicU8::new(0),
        }
    }

    pub fn is_byte_seeking(&self) -> bool {
        self.byte_seeking.load(Ordering::Relaxed)
    }

    /// Called once the reader resolves `EngineConfig::byte_seek` against
    /// the opened demuxer (`ByteSeekMode::resolve`).
    pub fn set_byte_seeking(&self, on: bool) {
        self.byte_seeking.store(on, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_request.load(Ordering::Acquire)
    }

    pub fn request_abort(&self) {
        self.abort_request.store(true, Ordering::Release);
        self.wake_reader();
    }

    pub fn set_end_reason(&self, reason: PlaybackEndReason) {
        let code = match reason {
            PlaybackEndReason::Eof => 1,
            PlaybackEndReason::Error => 2,
            PlaybackEndReason::Stopped => 3,
        };
        self.end_reason.store(code, Ordering::Release);
    }

    pub fn end_reason(&self) -> Option<PlaybackEndReason> {
        match self.end_reason.load(Ordering::Acquire) {
            1 => Some(PlaybackEndReason::Eof),
            2 => Some(PlaybackEndReason::Error),
            3 => Some(PlaybackEndReason::Stopped),
            _ => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Freeze/unfreeze every clock; resuming re-bases each clock's reading
    /// to "now" so it doesn't jump by however long it was paused.
    pub fn toggle_pause(&self, clocks: &Clocks) {
        let now_paused = !self.paused.load(Ordering::Acquire);
        self.paused.store(now_paused, Ordering::Release);
        clocks.audio.set_paused(now_paused);
        clocks.video.set_paused(now_paused);
        clocks.external.set_paused(now_paused);
    }

    pub fn volume_percent(&self) -> u8 {
        self.volume_percent.load(Ordering::Relaxed)
    }

    pub fn set_volume_percent(&self, v: u8) {
        self.volume_percent.store(v.min(MIX_MAX), Ordering::Relaxed);
    }

    pub fn adjust_volume(&self, up: bool) {
        let cur = self.volume_percent();
        let next = if up {
            cur.saturating_add(VOLUME_STEP).min(MIX_MAX)
        } else {
            cur.saturating_sub(VOLUME_STEP)
        };
        self.volume_percent.store(next, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Coalesced: a second seek before the reader services the first just
    /// overwrites the pending request.
    pub fn request_seek(&self, rel_seconds: f64, by_bytes: bool) {
        *self.seek.lock().unwrap() = Some(PendingSeek { rel_seconds, by_bytes });
        self.wake_reader();
    }

    pub fn take_seek(&self) -> Option<PendingSeek> {
        self.seek.lock().unwrap().take()
    }

    pub fn has_pending_seek(&self) -> bool {
        self.seek.lock().unwrap().is_some()
    }

    pub fn take_queue_attachments_req(&self) -> bool {
        self.queue_attachments_req.swap(false, Ordering::AcqRel)
    }

    pub fn request_queue_attachments(&self) {
        self.queue_attachments_req.store(true, Ordering::Release);
    }

    pub fn request_cycle_stream(&self) {
        self.cycle_stream_req.store(true, Ordering::Release);
        self.wake_reader();
    }

    pub fn take_cycle_stream_req(&self) -> bool {
        self.cycle_stream_req.swap(false, Ordering::AcqRel)
    }

    /// Wake the reader's backpressure/seek wait promptly.
    pub fn wake_reader(&self) {
        let _g = self.continue_read.lock().unwrap();
        self.continue_read_cv.notify_all();
    }

    /// Reader-side wait, capped at 10ms per §4.7 step 4 / §9's read-retry note.
    pub fn wait_continue_read(&self, timeout: std::time::Duration) {
        let g = self.continue_read.lock().unwrap();
        let _ = self.continue_read_cv.wait_timeout(g, timeout).unwrap();
    }

    /// Route one input event to the corresponding control action.
    pub fn apply_input_event(&self, event: InputEvent, clocks: &Clocks) -> bool {
        match event {
            InputEvent::TogglePause => {
                self.toggle_pause(clocks);
                false
            }
            InputEvent::VolumeUp => {
                self.adjust_volume(true);
                false
            }
            InputEvent::VolumeDown => {
                self.adjust_volume(false);
                false
            }
            InputEvent::SeekRelative(secs) => {
                self.request_seek(secs, self.is_byte_seeking());
                false
            }
            InputEvent::CycleStream => {
                self.request_cycle_stream();
                false
            }
            InputEvent::Resize => false,
            InputEvent::Quit => {
                self.set_end_reason(PlaybackEndReason::Stopped);
                self.request_abort();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockId, SerialRef};

    fn clocks() -> Clocks {
        Clocks::new(SerialRef::new(), SerialRef::new(), true, true, ClockId::Audio)
    }

    #[test]
    fn volume_steps_clamp_to_range() {
        let c = Controller::new(99);
        c.adjust_volume(true);
        assert_eq!(c.volume_percent(), MIX_MAX);
        let c2 = Controller::new(1);
        c2.adjust_volume(false);
        assert_eq!(c2.volume_percent(), 0);
    }

    #[test]
    fn seek_requests_coalesce() {
        let c = Controller::new(50);
        c.request_seek(10.0, false);
        c.request_seek(20.0, false);
        let seek = c.take_seek().unwrap();
        assert_eq!(seek.rel_seconds, 20.0);
        assert!(c.take_seek().is_none());
    }

    #[test]
    fn seek_relative_event_uses_byte_seeking_flag() {
        let c = Controller::new(50);
        let clocks = clocks();
        c.apply_input_event(InputEvent::SeekRelative(10.0), &clocks);
        assert!(!c.take_seek().unwrap().by_bytes);

        c.set_byte_seeking(true);
        c.apply_input_event(InputEvent::SeekRelative(10.0), &clocks);
        assert!(c.take_seek().unwrap().by_bytes);
    }

    #[test]
    fn toggle_pause_freezes_clocks() {
        let clocks = clocks();
        clocks.audio.serial_ref().set(0);
        clocks.audio.set(1.0, 0);
        let c = Controller::new(50);
        c.toggle_pause(&clocks);
        assert!(c.is_paused());
        assert!(clocks.audio.is_paused());
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(clocks.audio.read(), 1.0);
    }

    #[test]
    fn quit_event_requests_abort_and_reports_terminal() {
        let c = Controller::new(50);
        let clocks = clocks();
        let terminal = c.apply_input_event(InputEvent::Quit, &clocks);
        assert!(terminal);
        assert!(c.is_aborted());
        assert_eq!(c.end_reason(), Some(PlaybackEndReason::Stopped));
    }

    #[test]
    fn end_reason_is_unset_until_recorded() {
        let c = Controller::new(50);
        assert_eq!(c.end_reason(), None);
        c.set_end_reason(PlaybackEndReason::Eof);
        assert_eq!(c.end_reason(), Some(PlaybackEndReason::Eof));
    }
}
