//! The demuxer boundary (§1): out of scope beyond this trait.

use crate::packet::{MediaKind, Packet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamId(pub u32);

#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub id: StreamId,
    pub kind: MediaKind,
    pub attached_pic: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SeekRequest {
    /// Target position, either seconds (time-seek) or bytes (byte-seek).
    pub target: i64,
    pub min: i64,
    pub max: i64,
    pub by_bytes: bool,
}

#[derive(Debug)]
pub enum DemuxEvent {
    Packet(Packet),
    /// No more packets for this stream right now.
    Eof,
}

/// Out-of-scope external collaborator: a demuxer reads packets and can
/// seek. The engine drives it from the reader agent only.
pub trait Demuxer: Send {
    fn streams(&self) -> &[StreamInfo];

    /// Produces the next packet for whatever stream the underlying
    /// container happens to interleave next, or `Eof` once exhausted.
    fn read_packet(&mut self) -> std::io::Result<DemuxEvent>;

    fn seek(&mut self, req: SeekRequest) -> std::io::Result<()>;

    /// Best-effort total duration in seconds, if known.
    fn duration(&self) -> Option<f64> {
        None
    }

    /// Whether this container format is naturally byte-seekable rather than
    /// time-seekable (e.g. raw/ADTS streams with no reliable timestamp
    /// index); consulted only when `ByteSeekMode::Auto` needs resolving
    /// (§6 "-1 = auto by format flag"). Default `false`.
    fn prefers_byte_seek(&self) -> bool {
        false
    }

    /// Current read position in bytes, if the demuxer can report one; used
    /// to anchor a relative byte-seek. Default `-1` (unknown).
    fn byte_position(&self) -> i64 {
        -1
    }

    /// Average bit rate in bits/second, if known, so a relative byte-seek
    /// can convert a time offset into a proportional byte offset.
    fn bit_rate_bps(&self) -> Option<u64> {
        None
    }

    /// The embedded cover-art packet for a stream whose `StreamInfo`
    /// carries `attached_pic = true`, if the demuxer can supply one (§4.7
    /// step 3, §8 scenario S6). Default `None` for demuxers with no
    /// attached-picture stream.
    fn attached_picture(&self, _stream_id: StreamId) -> Option<Packet> {
        None
    }
}
