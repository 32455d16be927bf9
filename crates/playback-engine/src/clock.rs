//! Drifting PTS timeline with pause, speed, and serial invalidation (§4.3).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::packet::Serial;

pub const NOSYNC_THRESHOLD: f64 = 10.0;
const SPEED_STEP: f64 = 0.001;
const SPEED_MIN: f64 = 0.900;
const SPEED_MAX: f64 = 1.010;

/// Which clock an engine instance is reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockId {
    Audio,
    Video,
    External,
}

/// A shared, lock-free-reader clock reference into a stream's packet-queue
/// serial, so a stale clock (one whose stream was flushed) reads `NaN`
/// instead of a misleadingly precise but outdated value.
#[derive(Clone)]
pub struct SerialRef(Arc<AtomicU64>);

impl SerialRef {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    pub fn set(&self, serial: Serial) {
        self.0.store(serial, Ordering::Release);
    }

    pub fn get(&self) -> Serial {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for SerialRef {
    fn default() -> Self {
        Self::new()
    }
}

/// `(pts, pts_drift, last_updated, speed, serial, paused)` published as one
/// short critical section per update so concurrent readers always see a
/// self-consistent tuple (never a torn mix of an old pts with a new speed).
#[derive(Clone, Copy)]
struct Published {
    pts: f64,
    pts_drift: f64,
    last_updated: Instant,
    speed: f64,
    serial: Serial,
}

pub struct Clock {
    state: std::sync::Mutex<Published>,
    paused: std::sync::atomic::AtomicBool,
    /// Back-reference to the feeding queue's serial; when it no longer
    /// matches our own `serial`, this clock is obsolete.
    queue_serial_ref: SerialRef,
}

impl Clock {
    pub fn new(queue_serial_ref: SerialRef) -> Self {
        let now = Instant::now();
        Self {
            state: std::sync::Mutex::new(Published {
                pts: f64::NAN,
                pts_drift: f64::NAN,
                last_updated: now,
                speed: 1.0,
                serial: 0,
            }),
            paused: std::sync::atomic::AtomicBool::new(false),
            queue_serial_ref,
        }
    }

    /// `pts_drift + now - (now - last_updated)·(1 - speed)` when running;
    /// `pts` when paused; `NaN` if the backing queue serial has moved on.
    pub fn read(&self) -> f64 {
        let st = *self.state.lock().unwrap();
        if self.queue_serial_ref.get() != st.serial {
            return f64::NAN;
        }
        if self.paused.load(Ordering::Acquire) {
            return st.pts;
        }
        let elapsed = st.last_updated.elapsed().as_secs_f64();
        st.pts_drift + elapsed * st.speed
    }

    /// Recompute `pts_drift = pts - now`, `last_updated = now`.
    pub fn set_at(&self, pts: f64, serial: Serial, at: Instant) {
        let mut st = self.state.lock().unwrap();
        st.pts = pts;
        st.last_updated = at;
        st.pts_drift = if pts.is_nan() { f64::NAN } else { pts };
        st.serial = serial;
    }

    pub fn set(&self, pts: f64, serial: Serial) {
        self.set_at(pts, serial, Instant::now());
    }

    pub fn speed(&self) -> f64 {
        self.state.lock().unwrap().speed
    }

    /// Rebase to the current reading, then change speed, so the clock
    /// doesn't jump at the instant speed changes.
    pub fn set_speed(&self, speed: f64) {
        let serial = self.state.lock().unwrap().serial;
        let current = self.read();
        let mut st = self.state.lock().unwrap();
        st.pts = current;
        st.pts_drift = current;
        st.last_updated = Instant::now();
        st.speed = speed;
        st.serial = serial;
    }

    pub fn set_paused(&self, paused: bool) {
        if paused {
            let pts = self.read();
            let mut st = self.state.lock().unwrap();
            st.pts = pts;
        }
        self.paused.store(paused, Ordering::Release);
        if !paused {
            let mut st = self.state.lock().unwrap();
            st.last_updated = Instant::now();
            st.pts_drift = st.pts;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn serial_ref(&self) -> &SerialRef {
        &self.queue_serial_ref
    }
}

/// `sync_to_slave`: bring `master` in line with `slave` if it drifted past
/// `NOSYNC_THRESHOLD` or went stale.
pub fn sync_clock_to_slave(master: &Clock, slave: &Clock) {
    let master_clock = master.read();
    let slave_clock = slave.read();
    if !slave_clock.is_nan() && (master_clock.is_nan() || (master_clock - slave_clock).abs() > NOSYNC_THRESHOLD) {
        master.set(slave_clock, slave.state.lock().unwrap().serial);
    }
}

/// Three clocks sharing one engine instance, with master-selection fallback.
pub struct Clocks {
    pub audio: Clock,
    pub video: Clock,
    pub external: Clock,
    has_audio: std::sync::atomic::AtomicBool,
    has_video: std::sync::atomic::AtomicBool,
    pub preferred: ClockId,
}

impl Clocks {
    pub fn new(
        audio_serial: SerialRef,
        video_serial: SerialRef,
        has_audio: bool,
        has_video: bool,
        preferred: ClockId,
    ) -> Self {
        Self {
            audio: Clock::new(audio_serial),
            video: Clock::new(video_serial),
            external: Clock::new(SerialRef::new()),
            has_audio: std::sync::atomic::AtomicBool::new(has_audio),
            has_video: std::sync::atomic::AtomicBool::new(has_video),
            preferred,
        }
    }

    /// Called once the engine actually opens the corresponding stream;
    /// master selection consults this rather than the construction-time
    /// value, since streams are opened after `Clocks` is built.
    pub fn set_has_audio(&self, present: bool) {
        self.has_audio.store(present, Ordering::Release);
    }

    pub fn set_has_video(&self, present: bool) {
        self.has_video.store(present, Ordering::Release);
    }

    fn has_audio(&self) -> bool {
        self.has_audio.load(Ordering::Acquire)
    }

    fn has_video(&self) -> bool {
        self.has_video.load(Ordering::Acquire)
    }

    /// Resolve the preference to a concrete, present clock: AUDIO → EXTERNAL
    /// when audio absent; VIDEO → AUDIO → EXTERNAL when video absent.
    pub fn master_id(&self) -> ClockId {
        match self.preferred {
            ClockId::Audio => {
                if self.has_audio() {
                    ClockId::Audio
                } else {
                    ClockId::External
                }
            }
            ClockId::Video => {
                if self.has_video() {
                    ClockId::Video
                } else if self.has_audio() {
                    ClockId::Audio
                } else {
                    ClockId::External
                }
            }
            ClockId::External => ClockId::External,
        }
    }

    pub fn master(&self) -> &Clock {
        match self.master_id() {
            ClockId::Audio => &self.audio,
            ClockId::Video => &self.video,
            ClockId::External => &self.external,
        }
    }

    pub fn master_value(&self) -> f64 {
        self.master().read()
    }

    /// Nudge the external clock's speed towards the packet queues' fill
    /// level when it is the master; see Open Question in the design notes.
    pub fn update_external_clock_speed(&self, min_fill_frac: f64) {
        if min_fill_frac < 0.3 {
            let speed = (self.external.speed() - SPEED_STEP).max(SPEED_MIN);
            self.external.set_speed(speed);
        } else if min_fill_frac > 0.7 {
            let speed = (self.external.speed() + SPEED_STEP).min(SPEED_MAX);
            self.external.set_speed(speed);
        } else {
            let speed = self.external.speed();
            let towards_one = if speed < 1.0 {
                (speed + SPEED_STEP).min(1.0)
            } else if speed > 1.0 {
                (speed - SPEED_STEP).max(1.0)
            } else {
                speed
            };
            self.external.set_speed(towards_one);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn read_returns_pts_immediately_after_set() {
        let c = Clock::new(SerialRef::new());
        c.serial_ref().set(0);
        c.set(5.0, 0);
        let r = c.read();
        assert!((r - 5.0).abs() < 0.01);
    }

    #[test]
    fn read_advances_while_running() {
        let c = Clock::new(SerialRef::new());
        c.serial_ref().set(0);
        c.set(0.0, 0);
        thread::sleep(Duration::from_millis(30));
        let r = c.read();
        assert!(r > 0.02);
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let c = Clock::new(SerialRef::new());
        c.serial_ref().set(0);
        c.set(1.0, 0);
        c.set_paused(true);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(c.read(), 1.0);
    }

    #[test]
    fn stale_serial_reads_nan() {
        let sref = SerialRef::new();
        let c = Clock::new(sref.clone());
        sref.set(1);
        c.set(2.0, 1);
        assert!(!c.read().is_nan());
        sref.set(2);
        assert!(c.read().is_nan());
    }

    #[test]
    fn master_selection_falls_back_when_audio_absent() {
        let clocks = Clocks::new(SerialRef::new(), SerialRef::new(), false, true, ClockId::Audio);
        assert_eq!(clocks.master_id(), ClockId::External);
    }

    #[test]
    fn master_selection_video_falls_back_through_audio_then_external() {
        let clocks = Clocks::new(SerialRef::new(), SerialRef::new(), true, false, ClockId::Video);
        assert_eq!(clocks.master_id(), ClockId::Audio);
        let clocks2 = Clocks::new(SerialRef::new(), SerialRef::new(), false, false, ClockId::Video);
        assert_eq!(clocks2.master_id(), ClockId::External);
    }

    #[test]
    fn sync_to_slave_snaps_on_large_drift() {
        let master = Clock::new(SerialRef::new());
        let slave = Clock::new(SerialRef::new());
        master.serial_ref().set(0);
        slave.serial_ref().set(0);
        master.set(0.0, 0);
        slave.set(20.0, 0);
        sync_clock_to_slave(&master, &slave);
        assert!((master.read() - 20.0).abs() < 0.1);
    }

    #[test]
    fn sync_to_slave_snaps_when_master_nan() {
        let master = Clock::new(SerialRef::new());
        let slave = Clock::new(SerialRef::new());
        slave.serial_ref().set(0);
        slave.set(7.0, 0);
        sync_clock_to_slave(&master, &slave);
        assert!((master.read() - 7.0).abs() < 0.1);
    }
}
