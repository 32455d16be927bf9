//! Demuxed packets and the generational serial that makes flush correct.

/// Monotonically increasing generation counter. Bumped once per flush
/// marker; every packet/frame stamped with a serial older than its queue's
/// current serial is stale and must be discarded without presentation.
pub type Serial = u64;

/// Which media stream a packet/frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Subtitle,
}

/// Opaque demuxed payload plus the timing metadata the decoder needs.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream_id: u32,
    pub data: Vec<u8>,
    /// Presentation timestamp in seconds, `NaN` if unknown.
    pub pts: f64,
    /// Decode timestamp in seconds, `NaN` if unknown.
    pub dts: f64,
    /// Estimated duration in seconds.
    pub duration: f64,
    /// Source byte offset, or -1 if unknown.
    pub pos: i64,
    pub flags: PacketFlags,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketFlags {
    pub keyframe: bool,
    pub attached_pic: bool,
    pub corrupt: bool,
}

impl Packet {
    /// Fixed per-entry bookkeeping overhead counted towards `PacketQueue::size`,
    /// matching the original's accounting of queue memory beyond raw payload bytes.
    pub const ENTRY_OVERHEAD: usize = 64;

    pub fn byte_cost(&self) -> usize {
        self.data.len() + Self::ENTRY_OVERHEAD
    }
}

/// An entry stored in a `PacketQueue`.
///
/// This is the Rust-native replacement for "flush marker by pointer
/// identity": flush and end-of-stream are explicit variants instead of a
/// sentinel packet object compared by address.
#[derive(Clone, Debug)]
pub enum PacketEntry {
    Data(Packet),
    /// Bumps the queue's serial when enqueued; decoder agents must drain
    /// silently until the next `Data` entry with the new serial.
    Flush,
    /// Sentinel meaning "no more packets for this stream until further
    /// notice" (reader reached EOF, or a stream was closed).
    EndOfStream { stream_id: u32 },
}

impl PacketEntry {
    pub fn byte_cost(&self) -> usize {
        match self {
            PacketEntry::Data(p) => p.byte_cost(),
            PacketEntry::Flush | PacketEntry::EndOfStream { .. } => Packet::ENTRY_OVERHEAD,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            PacketEntry::Data(p) => p.duration,
            _ => 0.0,
        }
    }
}
