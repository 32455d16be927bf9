//! Concrete `Demuxer` + `Decoder` pair over an audio file (SPEC_FULL.md §1's
//! "concrete collaborators shipped with the engine"), grounded on the
//! teacher's `decode.rs` (Symphonia probing and packet decoding).

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder as SymphoniaDecoderTrait, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::decoder::{DecodedUnit, Decoder};
use crate::demux::{DemuxEvent, Demuxer, SeekRequest, StreamInfo};
use crate::packet::{MediaKind, Packet, PacketFlags};
use crate::sinks::AudioSamples;

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// Opens one audio-only file and demuxes its single default track.
pub struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
    streams: Vec<StreamInfo>,
    track_id: u32,
    time_base_num: u32,
    time_base_den: u32,
}

impl SymphoniaDemuxer {
    pub fn open(path: &Path) -> std::io::Result<(Self, CodecParameters)> {
        let file = File::open(path)?;
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(io_error)?;
        let format = probed.format;
        let track = format.default_track().ok_or_else(|| io_error("no default audio track"))?;
        let track_id = track.id;
        let (num, den) = track.codec_params.time_base.map(|tb| (tb.numer, tb.denom)).unwrap_or((1, 1));
        let codec_params = track.codec_params.clone();
        let streams = vec![StreamInfo {
            id: crate::demux::StreamId(track_id),
            kind: MediaKind::Audio,
            attached_pic: false,
        }];
        Ok((Self { format, streams, track_id, time_base_num: num, time_base_den: den }, codec_params))
    }

    fn ts_to_secs(&self, ts: u64) -> f64 {
        if self.time_base_den == 0 {
            0.0
        } else {
            ts as f64 * self.time_base_num as f64 / self.time_base_den as f64
        }
    }
}

impl Demuxer for SymphoniaDemuxer {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> std::io::Result<DemuxEvent> {
        match self.format.next_packet() {
            Ok(pkt) => {
                let pts = self.ts_to_secs(pkt.ts());
                let dur = self.ts_to_secs(pkt.dur());
                Ok(DemuxEvent::Packet(Packet {
                    stream_id: self.track_id,
                    data: pkt.data.to_vec(),
                    pts,
                    dts: pts,
                    duration: dur,
                    pos: -1,
                    flags: PacketFlags::default(),
                }))
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(DemuxEvent::Eof),
            Err(e) => Err(io_error(e)),
        }
    }

    fn seek(&mut self, req: SeekRequest) -> std::io::Result<()> {
        let secs = (req.target.max(0) as u64) / 1_000_000;
        let frac = ((req.target.max(0) as u64) % 1_000_000) as f64 / 1_000_000.0;
        self.format
            .seek(SeekMode::Accurate, SeekTo::Time { time: Time::new(secs, frac), track_id: Some(self.track_id) })
            .map(|_| ())
            .map_err(io_error)
    }

    fn duration(&self) -> Option<f64> {
        let track = self.format.default_track()?;
        let frames = track.codec_params.n_frames?;
        let rate = track.codec_params.sample_rate? as f64;
        if rate <= 0.0 {
            None
        } else {
            Some(frames as f64 / rate)
        }
    }
}

/// Decodes packets from one Symphonia audio track into interleaved `f32`.
pub struct SymphoniaAudioDecoder {
    decoder: Box<dyn SymphoniaDecoderTrait>,
    sample_rate: u32,
    channels: u16,
    pending: Option<(Vec<f32>, usize)>,
}

impl SymphoniaAudioDecoder {
    pub fn new(codec_params: &CodecParameters) -> std::io::Result<Self> {
        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(io_error)?;
        let sample_rate = codec_params.sample_rate.unwrap_or(44_100);
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);
        Ok(Self { decoder, sample_rate, channels, pending: None })
    }
}

impl Decoder for SymphoniaAudioDecoder {
    type Payload = AudioSamples;

    fn send_packet(&mut self, data: &[u8]) -> Result<(), String> {
        let packet = symphonia::core::formats::Packet::new_from_slice(0, 0, 0, data);
        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
                buf.copy_interleaved_ref(decoded);
                let samples = buf.samples().to_vec();
                let nb_samples = samples.len() / self.channels.max(1) as usize;
                self.pending = Some((samples, nb_samples));
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    fn receive_frame(&mut self) -> Result<Option<DecodedUnit<AudioSamples>>, String> {
        let Some((samples, nb_samples)) = self.pending.take() else {
            return Ok(None);
        };
        Ok(Some(DecodedUnit {
            payload: AudioSamples { interleaved: samples, sample_rate: self.sample_rate, channels: self.channels },
            pts: None,
            nb_samples,
            duration: nb_samples as f64 / self.sample_rate.max(1) as f64,
            format: "f32".to_string(),
            width: 0,
            height: 0,
        }))
    }

    fn flush(&mut self) {
        self.decoder.reset();
        self.pending = None;
    }
}
