//! Error types for dubsync core

use thiserror::Error;

/// Result type alias for dubsync core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building, playing or exporting a dub
#[derive(Debug, Error)]
pub enum Error {
    /// No usable segments; raised before any clip is generated
    #[error("Timeline is empty: no segments with a positive duration")]
    EmptyTimeline,

    /// A segment violates the timing invariants
    #[error("Invalid segment {index}: {reason}")]
    InvalidSegment {
        /// Position of the segment in the timeline
        index: usize,
        /// What is wrong with it
        reason: String,
    },

    /// A single clip could not be produced. Absorbed by the batch; the slot
    /// becomes silence.
    #[error("Clip generation failed for segment {index}: {reason}")]
    ClipGeneration {
        /// Position of the segment in the timeline
        index: usize,
        /// Failure detail from the generator or decoder
        reason: String,
    },

    /// Every clip in the batch failed, so no track was produced
    #[error("Failed to generate any audio clips ({count} segments attempted)")]
    AllClipsFailed {
        /// Number of segments in the batch
        count: usize,
    },

    /// Malformed or truncated PCM / WAV input
    #[error("Codec error: {0}")]
    Codec(String),

    /// The reference video exposes no capturable visual track
    #[error("Could not capture video track from source")]
    NoVideoTrack,

    /// The recorder reported an error during export
    #[error("Recorder failure: {0}")]
    RecorderFailure(String),

    /// Host environment (audio device, decoder, clock) failure
    #[error("Host error: {0}")]
    Host(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the whole operation may succeed.
    ///
    /// Batch- and export-level failures depend on external services or the
    /// host and are worth another attempt; bad input is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AllClipsFailed { .. }
                | Error::ClipGeneration { .. }
                | Error::NoVideoTrack
                | Error::RecorderFailure(_)
                | Error::Host(_)
                | Error::Io(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
