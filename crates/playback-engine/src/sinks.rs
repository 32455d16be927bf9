//! Video/audio sink boundaries (§1): out-of-scope external collaborators
//! reached only through these traits.

use crate::error::Result;

/// Negotiated audio output format, mirroring what a real device callback
/// would report back after opening.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One interleaved chunk of decoded audio, the `Decoder::Payload` for the
/// audio stream and the `Frame<AudioSamples>` payload carried by the sample
/// queue.
#[derive(Clone, Debug, Default)]
pub struct AudioSamples {
    pub interleaved: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSamples {
    pub fn nb_samples(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.interleaved.len() / self.channels as usize
        }
    }
}

/// A decoded video picture, kept deliberately opaque (planar/packed layout
/// is a decoder concern, not the engine's).
#[derive(Clone, Debug, Default)]
pub struct VideoPicture {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A decoded subtitle region with its own display window, separate from the
/// frame's `pts`/`duration` (§4.5 step 2's overlay-timing rule needs both).
#[derive(Clone, Debug, Default)]
pub struct SubtitlePicture {
    pub rects: Vec<u8>,
    pub start_display_time: f64,
    pub end_display_time: f64,
}

/// Key/event surface (§6), deliberately small and shaped like `ffplay`'s SDL
/// key handler so a terminal or windowed sink can both implement it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UserEvent {
    HideControls,
    Resize,
}

/// Out-of-scope external collaborator: presents pictures and pumps events.
pub trait VideoSink: Send {
    fn present_frame(&mut self, pixels: &[u8], w: u32, h: u32);
    fn poll_events(&mut self) -> Vec<crate::control::InputEvent>;
    fn post_user_event(&mut self, kind: UserEvent);
}

/// Out-of-scope external collaborator: negotiates a format, exposes
/// pause/resume, and drives a pull callback from its own thread.
pub trait AudioSink: Send {
    fn open(&mut self, wanted: AudioSpec) -> Result<AudioSpec>;

    /// Install the pull callback and start the device stream. The callback
    /// fills `buffer` (interleaved, `negotiated spec` layout) completely on
    /// every invocation; `bytes_played` reports the hardware write point in
    /// bytes so the engine can timestamp the audio clock backward from it.
    fn start(&mut self, fill: Box<dyn FnMut(&mut [f32]) + Send + 'static>) -> Result<()>;

    fn pause(&mut self, paused: bool);

    /// Bytes currently buffered downstream of the callback (device + any
    /// internal queue), used to back-date the audio clock.
    fn buffered_bytes(&self) -> usize {
        0
    }
}
