//! The playback engine: demuxes, decodes, synchronizes, and presents one
//! media item at a time, driven entirely through the `Engine` handle.
//!
//! Callers provide the out-of-scope collaborators (a [`demux::Demuxer`], one
//! [`decoder::Decoder`] per stream, a [`sinks::VideoSink`], a
//! [`sinks::AudioSink`]) and this crate owns everything between them:
//! queueing, clock synchronization, backpressure, seeking, and teardown.

pub mod audio_render;
pub mod clock;
pub mod config;
pub mod control;
pub mod cpal_sink;
pub mod decoder;
pub mod demux;
pub mod device;
pub mod engine;
pub mod error;
pub mod frame;
pub mod packet;
pub mod packet_queue;
pub mod reader;
pub mod sinks;
pub mod status;
pub mod symphonia_source;
pub mod sync;
pub mod video_refresh;

pub use engine::Engine;
pub use error::{PlaybackError, Result};
