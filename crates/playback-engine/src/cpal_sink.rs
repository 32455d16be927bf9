//! `AudioSink` over CPAL (SPEC_FULL.md §1's concrete `CpalAudioSink`),
//! grounded on the teacher's `playback.rs` (stream building, sample-format
//! dispatch) and `device.rs` (device/config selection).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::device::{pick_buffer_size, pick_device, pick_output_config};
use crate::error::{PlaybackError, Result};
use crate::sinks::{AudioSink, AudioSpec};

pub struct CpalAudioSink {
    host: cpal::Host,
    device_name: Option<String>,
    stream: Option<cpal::Stream>,
    negotiated: Option<AudioSpec>,
}

impl CpalAudioSink {
    pub fn new(device_name: Option<String>) -> Self {
        Self { host: cpal::default_host(), device_name, stream: None, negotiated: None }
    }
}

impl AudioSink for CpalAudioSink {
    fn open(&mut self, wanted: AudioSpec) -> Result<AudioSpec> {
        let device = pick_device(&self.host, self.device_name.as_deref())
            .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        let supported = pick_output_config(&device, Some(wanted.sample_rate))
            .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        let negotiated = AudioSpec { sample_rate: supported.sample_rate(), channels: supported.channels() };
        self.negotiated = Some(negotiated);
        Ok(negotiated)
    }

    fn start(&mut self, mut fill: Box<dyn FnMut(&mut [f32]) + Send + 'static>) -> Result<()> {
        let negotiated = self.negotiated.ok_or_else(|| PlaybackError::Sink("open() not called".to_string()))?;
        let device = pick_device(&self.host, self.device_name.as_deref())
            .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        let supported = pick_output_config(&device, Some(negotiated.sample_rate))
            .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        let mut stream_config: cpal::StreamConfig = supported.config();
        if let Some(buf) = pick_buffer_size(&supported) {
            stream_config.buffer_size = buf;
        }

        let err_fn = |err| tracing::warn!(error = %err, "cpal stream error");
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| fill(data),
                err_fn,
                None,
            )
            .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        stream.play().map_err(|e| PlaybackError::Sink(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn pause(&mut self, paused: bool) {
        if let Some(stream) = &self.stream {
            let result = if paused { stream.pause() } else { stream.play() };
            if let Err(e) = result {
                tracing::warn!(error = %e, "cpal pause/play failed");
            }
        }
    }
}
