//! FIFO of demuxed packets with serial, abort, and blocking get.
//!
//! This generalizes the teacher's `SharedAudio` (a bounded `VecDeque<f32>`
//! guarded by a `Mutex` + `Condvar`) from raw interleaved samples to
//! generic, serial-stamped packet entries. The locking discipline — single
//! condvar as a general "state changed" signal, `abort`/`done` flags stored
//! under the same mutex as the data they gate — carries over unchanged.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::packet::{PacketEntry, Serial};

struct Inner {
    entries: VecDeque<(PacketEntry, Serial)>,
    serial: Serial,
    size: usize,
    duration: f64,
    nb_packets: usize,
}

/// Outcome of a `get`.
#[derive(Debug)]
pub enum GetResult {
    Entry(PacketEntry, Serial),
    Empty,
    Aborted,
}

/// Thread-safe, abortable queue of packet entries for one media stream.
///
/// Mirrors §4.1: `put`/`put_null`/`get`/`flush`/`start`/`abort`, plus the
/// size/duration/nb_packets accounting §8's invariant 3 requires.
pub struct PacketQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
    abort_request: AtomicBool,
}

impl PacketQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                serial: 0,
                size: 0,
                duration: 0.0,
                nb_packets: 0,
            }),
            cv: Condvar::new(),
            abort_request: AtomicBool::new(true),
        })
    }

    pub fn serial(&self) -> Serial {
        self.inner.lock().unwrap().serial
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    pub fn duration(&self) -> f64 {
        self.inner.lock().unwrap().duration
    }

    pub fn nb_packets(&self) -> usize {
        self.inner.lock().unwrap().nb_packets
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_request.load(Ordering::Acquire)
    }

    /// Append an entry. Bumps `serial` first if `entry` is `Flush`. Fails
    /// (returns `false`) only when the queue is aborted.
    pub fn put(&self, entry: PacketEntry) -> bool {
        let mut g = self.inner.lock().unwrap();
        if self.abort_request.load(Ordering::Acquire) {
            return false;
        }
        if matches!(entry, PacketEntry::Flush) {
            g.serial += 1;
        }
        let serial = g.serial;
        g.size += entry.byte_cost();
        g.duration += entry.duration();
        g.nb_packets += 1;
        g.entries.push_back((entry, serial));
        drop(g);
        self.cv.notify_one();
        true
    }

    pub fn put_null(&self, stream_id: u32) -> bool {
        self.put(PacketEntry::EndOfStream { stream_id })
    }

    /// Pop the head entry. If `block`, waits on the condvar until a put or
    /// abort occurs.
    pub fn get(&self, block: bool) -> GetResult {
        let mut g = self.inner.lock().unwrap();
        loop {
            if self.abort_request.load(Ordering::Acquire) {
                return GetResult::Aborted;
            }
            if let Some((entry, serial)) = g.entries.pop_front() {
                g.size -= entry.byte_cost();
                g.duration -= entry.duration();
                g.nb_packets -= 1;
                return GetResult::Entry(entry, serial);
            }
            if !block {
                return GetResult::Empty;
            }
            let (ng, _timeout) = self.cv.wait_timeout(g, Duration::from_millis(50)).unwrap();
            g = ng;
        }
    }

    /// Discard all entries without changing `serial`.
    pub fn flush(&self) {
        let mut g = self.inner.lock().unwrap();
        g.entries.clear();
        g.size = 0;
        g.duration = 0.0;
        g.nb_packets = 0;
    }

    /// Clear `abort_request` and enqueue a flush marker so consumers
    /// resynchronize on the bumped serial.
    pub fn start(&self) {
        self.abort_request.store(false, Ordering::Release);
        self.put(PacketEntry::Flush);
    }

    /// Set `abort_request` and wake every waiter.
    pub fn abort(&self) {
        {
            let _g = self.inner.lock().unwrap();
            self.abort_request.store(true, Ordering::Release);
        }
        self.cv.notify_all();
    }
}
