//! Configuration for stitching, generation, playback sync and export
//!
//! Every field has a serde default so a partial (or empty) TOML file is a
//! valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::timeline::stitcher::OverlapPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DubConfig {
    /// Output audio format
    #[serde(default)]
    pub audio: AudioConfig,

    /// Master track assembly
    #[serde(default)]
    pub stitch: StitchConfig,

    /// Clip generation fan-out
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Playback drift correction
    #[serde(default)]
    pub sync: SyncConfig,

    /// Audio + video export
    #[serde(default)]
    pub export: ExportConfig,
}

/// Output audio format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channels of the downloadable WAV
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Bits per sample of the downloadable WAV
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_channels() -> u16 {
    1
}

fn default_bits_per_sample() -> u16 {
    16
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bits_per_sample: default_bits_per_sample(),
        }
    }
}

/// Master track assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchConfig {
    /// Silence appended after the last segment end, in seconds
    #[serde(default = "default_padding_secs")]
    pub padding_secs: f64,

    /// How overlapping clips combine
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

fn default_padding_secs() -> f64 {
    0.5
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            padding_secs: default_padding_secs(),
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

/// Clip generation fan-out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Upper bound on in-flight generator calls (None = all at once)
    #[serde(default)]
    pub max_concurrent_clips: Option<usize>,
}

/// Playback drift correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Drift above which the source is restarted, in seconds
    #[serde(default = "default_hard_threshold_secs")]
    pub hard_threshold_secs: f64,

    /// Drift above which the playback rate is nudged, in seconds
    #[serde(default = "default_soft_threshold_secs")]
    pub soft_threshold_secs: f64,

    /// Proportional gain applied to drift for rate nudges
    #[serde(default = "default_correction_gain")]
    pub correction_gain: f64,

    /// Maximum relative deviation from the user rate (0.1 = ±10%)
    #[serde(default = "default_max_rate_deviation")]
    pub max_rate_deviation: f64,

    /// Correction tick interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_hard_threshold_secs() -> f64 {
    0.25
}

fn default_soft_threshold_secs() -> f64 {
    0.05
}

fn default_correction_gain() -> f64 {
    0.5
}

fn default_max_rate_deviation() -> f64 {
    0.1
}

fn default_tick_interval_ms() -> u64 {
    16
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hard_threshold_secs: default_hard_threshold_secs(),
            soft_threshold_secs: default_soft_threshold_secs(),
            correction_gain: default_correction_gain(),
            max_rate_deviation: default_max_rate_deviation(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Audio + video export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Recording continues this long past the master track, in seconds
    #[serde(default = "default_stop_padding_secs")]
    pub stop_padding_secs: f64,

    /// Container mime type requested from the recorder
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_stop_padding_secs() -> f64 {
    0.5
}

fn default_mime_type() -> String {
    "video/webm; codecs=vp9,opus".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            stop_padding_secs: default_stop_padding_secs(),
            mime_type: default_mime_type(),
        }
    }
}

impl DubConfig {
    /// Parse from a TOML string and validate
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DubConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the algorithms cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::ConfigError("audio.sample_rate must be > 0".into()));
        }
        if self.audio.channels == 0 || self.audio.bits_per_sample % 8 != 0 {
            return Err(Error::ConfigError(format!(
                "unsupported output layout: {} channels, {} bits",
                self.audio.channels, self.audio.bits_per_sample
            )));
        }
        non_negative("stitch.padding_secs", self.stitch.padding_secs)?;
        if self.generation.max_concurrent_clips == Some(0) {
            return Err(Error::ConfigError(
                "generation.max_concurrent_clips must be > 0".into(),
            ));
        }
        self.sync.validate()?;
        self.export.validate()
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{} must be finite and >= 0, got {}", name, value)))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{} must be finite and > 0, got {}", name, value)))
    }
}

impl ExportConfig {
    /// Reject a stop padding that cannot be turned into a timer
    pub fn validate(&self) -> Result<()> {
        non_negative("export.stop_padding_secs", self.stop_padding_secs)
    }
}

impl SyncConfig {
    /// Reject threshold combinations that would make the controller oscillate
    pub fn validate(&self) -> Result<()> {
        positive("sync.soft_threshold_secs", self.soft_threshold_secs)?;
        positive("sync.hard_threshold_secs", self.hard_threshold_secs)?;
        if self.soft_threshold_secs >= self.hard_threshold_secs {
            return Err(Error::ConfigError(format!(
                "sync.soft_threshold_secs ({}) must be below sync.hard_threshold_secs ({})",
                self.soft_threshold_secs, self.hard_threshold_secs
            )));
        }
        positive("sync.correction_gain", self.correction_gain)?;
        if !(self.max_rate_deviation > 0.0 && self.max_rate_deviation < 1.0) {
            return Err(Error::ConfigError(
                "sync.max_rate_deviation must be in (0, 1)".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::ConfigError("sync.tick_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}
