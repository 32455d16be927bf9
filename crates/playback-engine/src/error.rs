//! Error taxonomy for the playback engine.
//!
//! Kinds mirror the semantic categories the design calls for rather than
//! individual failure sites: callers branch on *recoverability*, not on
//! which function failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Orderly cancellation outcome from a blocking primitive (queue wait,
    /// reader backpressure, refresh sleep). Callers unwind without treating
    /// this as failure.
    #[error("aborted")]
    Aborted,

    /// First-class end-of-stream signal, not a failure.
    #[error("end of stream")]
    Eof,

    #[error("demux error: {0}")]
    Demux(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("sink error: {0}")]
    Sink(String),

    /// Allocation failure, sink open failure after negotiation is
    /// exhausted, lock-manager failure: unrecoverable, process should exit
    /// non-zero.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PlaybackError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, PlaybackError::Aborted)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, PlaybackError::Eof)
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
