//! Minimal CLI front end for the playback engine (§6).
//!
//! Wires the concrete collaborators SPEC_FULL.md §1 calls for —
//! `SymphoniaDemuxer`/`SymphoniaAudioDecoder` as the `Demuxer`/`Decoder` pair,
//! `CpalAudioSink` as the `AudioSink`, `TermVideoSink` as the minimal
//! `VideoSink`/event-pump stand-in — onto `playback_engine::Engine`. Video
//! and subtitle decoding are not bundled (§1's Non-goals), so this binary
//! only opens an audio stream; a real frontend would select codecs and open
//! `Engine::open_video`/`open_subtitle` the same way.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use playback_engine::cpal_sink::CpalAudioSink;
use playback_engine::device;
use playback_engine::engine::Engine;
use playback_engine::sinks::AudioSpec;
use playback_engine::symphonia_source::{SymphoniaAudioDecoder, SymphoniaDemuxer};

use playback_cli::cli::Args;
use playback_cli::term_sink::TermVideoSink;

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info,playback=info")))
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        if let Err(e) = device::list_devices(&host) {
            tracing::error!(error = %e, "failed to list output devices");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    // §6: SIGINT/SIGTERM exit 123. The reader/refresh loops have no
    // reachable quit flag at this point in startup, so the handler exits
    // the process directly, matching the teacher's own signal-handling
    // shape (`ctrlc::set_handler` calling `process::exit`).
    let _ = ctrlc::set_handler(|| std::process::exit(123));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal error");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_engine_config();

    let (demuxer, codec_params) =
        SymphoniaDemuxer::open(&args.path).with_context(|| format!("opening {}", args.path.display()))?;
    let sample_rate_hz = codec_params.sample_rate.unwrap_or(44_100);
    let decoder = SymphoniaAudioDecoder::new(&codec_params).context("constructing audio decoder")?;

    let mut engine = Engine::new(config.clone());
    engine.open_audio(decoder, sample_rate_hz);
    engine.start_reader(demuxer);

    let sink = CpalAudioSink::new(config.device_name.clone());
    let wanted = AudioSpec { sample_rate: sample_rate_hz, channels: 2 };
    engine
        .start_audio_sink(Box::new(sink), wanted)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("opening audio sink")?;

    let video_sink = TermVideoSink::new().context("initializing terminal input")?;
    let snapshot = engine.run_foreground(Box::new(video_sink));

    if args.stats {
        tracing::info!(
            elapsed_ms = ?snapshot.elapsed_ms,
            frame_drops_late = snapshot.frame_drops_late,
            av_diff_seconds = ?snapshot.av_diff_seconds,
            "final playback stats"
        );
    }

    Ok(())
}
