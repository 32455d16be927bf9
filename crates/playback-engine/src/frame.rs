//! Decoded frames and the fixed-capacity ring buffer that queues them.

use std::sync::Arc;

use crate::packet::Serial;
use crate::packet_queue::PacketQueue;

/// Decoded media unit. Generic over the payload so the same ring-buffer
/// logic serves audio samples, video pictures, and subtitle regions.
#[derive(Clone, Debug)]
pub struct Frame<P> {
    pub payload: P,
    /// Seconds, `NaN` if unknown.
    pub pts: f64,
    /// Estimated seconds.
    pub duration: f64,
    /// Source byte offset, or -1 if unknown.
    pub pos: i64,
    pub serial: Serial,
    pub format: String,
    /// Set once the video sink has uploaded this frame's payload to a
    /// texture; harmless no-op for audio/subtitle payloads.
    pub uploaded: bool,
    pub width: u32,
    pub height: u32,
}

impl<P> Frame<P> {
    pub fn new(payload: P, pts: f64, duration: f64, serial: Serial) -> Self {
        Self {
            payload,
            pts,
            duration,
            pos: -1,
            serial,
            format: String::new(),
            uploaded: false,
            width: 0,
            height: 0,
        }
    }
}

/// Fixed-capacity ring buffer of decoded frames (§4.2).
///
/// `max_size` follows the per-stream capacities the design calls for:
/// video 3, subtitle 16, audio 9. `keep_last` lets the most recently
/// consumed frame stay addressable via `peek_last` until the next `next()`
/// call — used by the video refresh scheduler to compute inter-frame
/// duration across ticks.
pub struct FrameQueue<P> {
    slots: Vec<Option<Frame<P>>>,
    max_size: usize,
    rindex: usize,
    windex: usize,
    size: usize,
    rindex_shown: bool,
    keep_last: bool,
    /// Non-owning back-reference used only to observe abort state; the
    /// packet queue itself is owned by the reader/decoder agents.
    pktq: Arc<PacketQueue>,
}

pub enum PeekResult<'a, P> {
    Frame(&'a Frame<P>),
    Aborted,
}

impl<P> FrameQueue<P> {
    pub fn new(max_size: usize, keep_last: bool, pktq: Arc<PacketQueue>) -> Self {
        let mut slots = Vec::with_capacity(max_size);
        slots.resize_with(max_size, || None);
        Self {
            slots,
            max_size,
            rindex: 0,
            windex: 0,
            size: 0,
            rindex_shown: false,
            keep_last,
            pktq,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn nb_remaining(&self) -> usize {
        self.size - self.rindex_shown as usize
    }

    /// Returns a writable slot index, blocking the caller's *logical* wait
    /// (callers poll this in their own loop with a short sleep, matching
    /// the reader/decoder agents' general "condition wait with
    /// cancellation" pattern) while `size == max_size` and the backing
    /// packet queue is not aborted.
    pub fn is_full(&self) -> bool {
        self.size >= self.max_size
    }

    pub fn is_aborted(&self) -> bool {
        self.pktq.is_aborted()
    }

    /// The feeding packet queue's current serial, against which a consumer
    /// must check a frame's own `serial` before committing it (§3).
    pub fn pktq_serial(&self) -> Serial {
        self.pktq.serial()
    }

    /// Write `frame` into the next writable slot and make it visible to
    /// readers. Caller must have already confirmed `!is_full()`.
    pub fn push(&mut self, frame: Frame<P>) {
        self.slots[self.windex] = Some(frame);
        self.windex = (self.windex + 1) % self.max_size;
        self.size += 1;
    }

    fn readable_index(&self) -> usize {
        (self.rindex + self.rindex_shown as usize) % self.max_size
    }

    /// The currently visible frame, or `None` if `size - rindex_shown <= 0`.
    pub fn peek(&self) -> Option<&Frame<P>> {
        if self.nb_remaining() == 0 {
            return None;
        }
        self.slots[self.readable_index()].as_ref()
    }

    pub fn peek_mut(&mut self) -> Option<&mut Frame<P>> {
        if self.size - self.rindex_shown as usize == 0 {
            return None;
        }
        let idx = self.readable_index();
        self.slots[idx].as_mut()
    }

    /// The frame after `peek()`. Undefined (returns `None`) if fewer than
    /// two frames remain.
    pub fn peek_next(&self) -> Option<&Frame<P>> {
        if self.nb_remaining() < 2 {
            return None;
        }
        let idx = (self.readable_index() + 1) % self.max_size;
        self.slots[idx].as_ref()
    }

    /// The most recently shown frame, valid only when `keep_last` and at
    /// least one frame has ever been consumed.
    pub fn peek_last(&self) -> Option<&Frame<P>> {
        if !self.keep_last {
            return None;
        }
        self.slots[self.rindex].as_ref()
    }

    /// Advance past the currently visible frame.
    pub fn next(&mut self) {
        if self.keep_last && !self.rindex_shown {
            self.rindex_shown = true;
            return;
        }
        self.slots[self.rindex] = None;
        self.rindex = (self.rindex + 1) % self.max_size;
        self.size -= 1;
    }
}

/// Cross-thread handle around a [`FrameQueue`]: one decoder agent writes,
/// one refresh/render consumer reads. Mirrors the packet queue's locking
/// discipline — a single condvar as a general "state changed" signal, and a
/// short critical section per operation so no lock is ever held across an
/// external blocking call.
pub struct SharedFrameQueue<P> {
    inner: std::sync::Mutex<FrameQueue<P>>,
    cv: std::sync::Condvar,
}

impl<P> SharedFrameQueue<P> {
    pub fn new(max_size: usize, keep_last: bool, pktq: Arc<PacketQueue>) -> Arc<Self> {
        Arc::new(Self {
            inner: std::sync::Mutex::new(FrameQueue::new(max_size, keep_last, pktq)),
            cv: std::sync::Condvar::new(),
        })
    }

    /// Blocks while full and not aborted, then writes `frame` and wakes one
    /// reader. Returns `false` if aborted before a slot became free.
    pub fn push_blocking(&self, frame: Frame<P>) -> bool {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.is_aborted() {
                return false;
            }
            if !g.is_full() {
                g.push(frame);
                drop(g);
                self.cv.notify_one();
                return true;
            }
            let (ng, _timeout) = self
                .cv
                .wait_timeout(g, std::time::Duration::from_millis(20))
                .unwrap();
            g = ng;
        }
    }

    /// Blocks while empty and not aborted. Returns `false` if aborted
    /// before a frame became available.
    pub fn wait_readable(&self) -> bool {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.nb_remaining() > 0 {
                return true;
            }
            if g.is_aborted() {
                return false;
            }
            let (ng, _timeout) = self
                .cv
                .wait_timeout(g, std::time::Duration::from_millis(20))
                .unwrap();
            g = ng;
        }
    }

    pub fn with_lock<R>(&self, f: impl FnOnce(&mut FrameQueue<P>) -> R) -> R {
        let mut g = self.inner.lock().unwrap();
        f(&mut g)
    }

    pub fn next(&self) {
        let mut g = self.inner.lock().unwrap();
        g.next();
        drop(g);
        self.cv.notify_one();
    }

    /// Wake every waiter (used when aborting).
    pub fn signal(&self) {
        self.cv.notify_all();
    }
}
