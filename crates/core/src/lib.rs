//! dubsync core - dubbed audio assembly and lip-locked playback
//!
//! This crate turns independently synthesized speech clips into one master
//! audio track aligned to a reference timeline, keeps that track in sync with
//! an independently clocked video while it plays, and muxes the two into an
//! exportable file.
//!
//! # Architecture
//!
//! - [`audio`]: PCM16 / WAV codec and shared sample buffers
//! - [`timeline`]: segments, persisted layouts, the [`Stitcher`] and SRT export
//! - [`generation`]: voice resolution and concurrent clip fan-out
//! - [`pipeline`]: analysis → generation → stitching orchestration
//! - [`sync`]: drift-correcting playback controller and its driver task
//! - [`export`]: audio + video merger over a recorder backend
//!
//! Speech synthesis, analysis, audio output and recording are host services
//! reached through traits; nothing here performs network or device I/O.
//!
//! # Example
//!
//! ```
//! use dubsync_core::audio::{Clip, DEFAULT_SAMPLE_RATE};
//! use dubsync_core::timeline::{Segment, Stitcher};
//!
//! let segments = vec![Segment::new("Speaker 1", "Hola", 0.0, 1.0)];
//! let clips = vec![Clip::new(vec![0.1; 12_000])];
//!
//! let track = Stitcher::new(DEFAULT_SAMPLE_RATE).stitch(&segments, &clips)?;
//! assert_eq!(track.len(), 36_000);
//! # Ok::<(), dubsync_core::Error>(())
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod export;
pub mod generation;
pub mod pipeline;
pub mod sync;
pub mod timeline;

mod error;
pub use error::{Error, Result};

pub use audio::{Clip, MasterTrack};
pub use config::DubConfig;
pub use timeline::{Segment, Stitcher};

/// Initialize logging
///
/// Installs a global fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
/// Call once at startup; a second call returns an error.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to install tracing subscriber: {}", e)))?;

    tracing::info!("dubsync core initialized");
    Ok(())
}
