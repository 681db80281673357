//! Mono audio buffers shared between playback, export and download paths

use std::sync::Arc;

use crate::audio::format::{decode_pcm16, encode_pcm16};
use crate::audio::wav::wrap_wav;
use crate::error::Result;

/// Sample rate of synthesized speech and of the master track
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Synthesized audio for one segment.
///
/// An empty clip stands for a failed or skipped generation and stitches as
/// silence.
#[derive(Clone, Default, PartialEq)]
pub struct Clip {
    samples: Vec<f32>,
}

impl Clip {
    /// Create a clip from normalized samples (takes ownership)
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// A clip representing a failed generation
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode a clip from little-endian 16-bit PCM bytes
    pub fn from_pcm16(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(decode_pcm16(bytes)?))
    }

    /// Samples of this clip
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the clip carries no audio
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at `sample_rate`
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Clip({} samples)", self.samples.len())
    }
}

/// The single assembled mono buffer spanning the whole timeline.
///
/// Cloning is cheap: playback sessions and export taps share the samples.
#[derive(Clone, PartialEq)]
pub struct MasterTrack {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl MasterTrack {
    /// Create a master track (takes ownership)
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    /// Decode a previously rendered track from 16-bit PCM bytes
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        Ok(Self::new(decode_pcm16(bytes)?, sample_rate))
    }

    /// Samples of the track
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shared handle to the samples (zero-copy)
    pub fn shared_samples(&self) -> Arc<Vec<f32>> {
        Arc::clone(&self.samples)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the track is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample index for a position in seconds, rounded like clip placement
    /// and clamped to the track
    pub fn sample_index(&self, position_secs: f64) -> usize {
        if !(position_secs > 0.0) {
            return 0;
        }
        ((position_secs * self.sample_rate as f64).round() as usize).min(self.samples.len())
    }

    /// Samples of `[start, end)` in seconds, clamped to the track
    pub fn slice_secs(&self, start_secs: f64, end_secs: f64) -> &[f32] {
        let start = self.sample_index(start_secs);
        let end = self.sample_index(end_secs).max(start);
        &self.samples[start..end]
    }

    /// Encode as little-endian 16-bit PCM
    pub fn to_pcm16(&self) -> Vec<u8> {
        encode_pcm16(&self.samples)
    }

    /// Encode as a mono 16-bit WAV file
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        wrap_wav(&self.to_pcm16(), self.sample_rate, 1, 16)
    }
}

impl std::fmt::Debug for MasterTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MasterTrack({} samples @ {} Hz, {:.3}s)",
            self.samples.len(),
            self.sample_rate,
            self.duration_secs()
        )
    }
}
