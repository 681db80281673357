//! dubsync - offline dub assembly
//!
//! Builds master tracks and subtitles from a persisted segment layout.
//!
//! # Usage
//!
//! ```bash
//! # Stitch clips/0.wav, clips/1.pcm, ... into one track
//! dubsync stitch --layout layout.json --clips ./clips --output dub.wav
//!
//! # Export subtitles
//! dubsync srt --layout layout.json --output dub.srt
//!
//! # Wrap raw 16-bit PCM in a WAV header
//! dubsync wrap --input clip.pcm --output clip.wav --sample-rate 24000
//! ```

mod clips;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dubsync_core::audio::{decode_pcm16, wrap_wav};
use dubsync_core::timeline::{to_srt, SegmentLayout, Stitcher};
use dubsync_core::DubConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "dubsync.toml";

/// dubsync - assemble dubbed speech into a timeline-aligned track
#[derive(Parser)]
#[command(name = "dubsync")]
#[command(author, version)]
#[command(about = "Stitch synthesized speech clips, wrap PCM and export subtitles")]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stitch per-segment clips into a master track WAV
    Stitch {
        /// Segment layout JSON
        #[arg(short, long)]
        layout: PathBuf,

        /// Directory holding `{index}.wav` or `{index}.pcm` per segment
        #[arg(long)]
        clips: PathBuf,

        /// Output WAV path
        #[arg(short, long, default_value = "dub.wav")]
        output: PathBuf,
    },

    /// Export the layout's segments as SRT subtitles
    Srt {
        /// Segment layout JSON
        #[arg(short, long)]
        layout: PathBuf,

        /// Output SRT path
        #[arg(short, long, default_value = "dub.srt")]
        output: PathBuf,
    },

    /// Wrap raw little-endian 16-bit PCM in a WAV header
    Wrap {
        /// Raw PCM input
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Sample rate (default: from config)
        #[arg(long)]
        sample_rate: Option<u32>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Stitch {
            layout,
            clips,
            output,
        } => run_stitch(&config, &layout, &clips, &output),
        Command::Srt { layout, output } => run_srt(&layout, &output),
        Command::Wrap {
            input,
            output,
            sample_rate,
        } => run_wrap(&config, &input, &output, sample_rate),
    }
}

/// Load configuration; a missing file means defaults
fn load_config(path: Option<&Path>) -> Result<DubConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(DubConfig::default());
    }
    DubConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn load_layout(path: &Path) -> Result<SegmentLayout> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read layout {}", path.display()))?;
    SegmentLayout::from_json(&json)
        .with_context(|| format!("Failed to parse layout {}", path.display()))
}

fn run_stitch(config: &DubConfig, layout: &Path, clips_dir: &Path, output: &Path) -> Result<()> {
    let layout = load_layout(layout)?;
    let segments = layout.segments();
    let sample_rate = config.audio.sample_rate;

    let clips = clips::load_clips(clips_dir, layout.segments.keys().copied(), sample_rate);
    let missing = clips.iter().filter(|c| c.is_empty()).count();

    let stitcher = Stitcher::from_config(sample_rate, &config.stitch);
    let (track, report) = stitcher
        .stitch_with_report(&segments, &clips)
        .context("Failed to stitch master track")?;

    let wav = track.to_wav().context("Failed to encode master track")?;
    std::fs::write(output, wav).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({:.2}s, {} clips placed, {} silent, {} truncated)",
        output.display(),
        track.duration_secs(),
        report.placed,
        missing,
        report.truncated
    );
    Ok(())
}

fn run_srt(layout: &Path, output: &Path) -> Result<()> {
    let layout = load_layout(layout)?;
    let segments = layout.segments();

    std::fs::write(output, to_srt(&segments))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} ({} subtitles)", output.display(), segments.len());
    Ok(())
}

fn run_wrap(
    config: &DubConfig,
    input: &Path,
    output: &Path,
    sample_rate: Option<u32>,
) -> Result<()> {
    let pcm = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    // Reject truncated input before writing a header that claims it is valid
    decode_pcm16(&pcm).with_context(|| format!("Invalid PCM in {}", input.display()))?;

    let sample_rate = sample_rate.unwrap_or(config.audio.sample_rate);
    anyhow::ensure!(sample_rate > 0, "sample rate must be positive");

    let wav = wrap_wav(
        &pcm,
        sample_rate,
        config.audio.channels,
        config.audio.bits_per_sample,
    )
    .with_context(|| format!("Cannot wrap {} at {} Hz", input.display(), sample_rate))?;
    std::fs::write(output, wav).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} bytes of PCM @ {} Hz)",
        output.display(),
        pcm.len(),
        sample_rate
    );
    Ok(())
}
