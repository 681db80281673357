//! Timed dialogue segments and their persisted layout
//!
//! Segments are authored and edited outside this crate. The core only reads
//! their timing; `text` is passed through to the clip generator and the
//! subtitle exporter untouched.

pub mod stitcher;
pub mod subtitle;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generation::VoiceSelection;

pub use stitcher::{OverlapPolicy, StitchReport, Stitcher};
pub use subtitle::{format_srt_timestamp, to_srt};

/// One timed dialogue unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Speaker label, e.g. "Speaker 1"
    pub speaker_id: String,
    /// Dialogue text (opaque to the core)
    pub text: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
}

impl Segment {
    /// Create a new segment
    pub fn new(
        speaker_id: impl Into<String>,
        text: impl Into<String>,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            text: text.into(),
            start_time,
            end_time,
        }
    }

    /// Nominal slot length in seconds
    pub fn slot_duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Check timing invariants; `index` is only used for the error
    pub fn validate(&self, index: usize) -> Result<()> {
        let reason = if !self.start_time.is_finite() || !self.end_time.is_finite() {
            "times must be finite"
        } else if self.start_time < 0.0 {
            "startTime must not be negative"
        } else if self.end_time < self.start_time {
            "endTime precedes startTime"
        } else {
            return Ok(());
        };

        Err(Error::InvalidSegment {
            index,
            reason: reason.to_string(),
        })
    }
}

/// Latest segment end across the timeline, or `None` when empty
pub fn timeline_end(segments: &[Segment]) -> Option<f64> {
    segments
        .iter()
        .map(|s| s.end_time)
        .fold(None, |acc, end| Some(acc.map_or(end, |m: f64| m.max(end))))
}

/// Validate every segment, failing with `EmptyTimeline` when there is nothing
/// to render
pub fn validate_timeline(segments: &[Segment]) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::EmptyTimeline);
    }
    for (index, segment) in segments.iter().enumerate() {
        segment.validate(index)?;
    }
    match timeline_end(segments) {
        Some(end) if end > 0.0 => Ok(()),
        _ => Err(Error::EmptyTimeline),
    }
}

/// Detected speaker gender, used to pick a default voice family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male voice family
    Male,
    /// Female voice family
    Female,
    /// Could not be determined; no voice is assigned
    Unknown,
}

/// A diarized speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    /// Speaker label, e.g. "Speaker 1"
    pub id: String,
    /// Detected gender
    pub gender: Gender,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
}

/// Output of the external diarization / transcription service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Detected source language
    pub language: String,
    /// Diarized speakers
    #[serde(default)]
    pub speakers: Vec<SpeakerProfile>,
    /// Timed segments
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Full transcription text, when the service provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

impl AnalysisResult {
    /// Rename a speaker across profiles, segments and the voice selection.
    ///
    /// Returns the number of segments changed. An empty or unchanged name is
    /// a no-op; a name already held by another speaker is rejected.
    pub fn rename_speaker(
        &mut self,
        selection: &mut VoiceSelection,
        old_id: &str,
        new_id: &str,
    ) -> Result<usize> {
        let new_id = new_id.trim();
        if new_id.is_empty() || new_id == old_id {
            return Ok(0);
        }
        if self.speakers.iter().any(|s| s.id == new_id) {
            return Err(Error::InvalidInput(format!(
                "speaker name \"{}\" already exists",
                new_id
            )));
        }

        for speaker in self.speakers.iter_mut().filter(|s| s.id == old_id) {
            speaker.id = new_id.to_string();
        }
        if let Some(voice) = selection.remove(old_id) {
            selection.insert(new_id.to_string(), voice);
        }

        let mut changed = 0;
        for segment in self.segments.iter_mut().filter(|s| s.speaker_id == old_id) {
            segment.speaker_id = new_id.to_string();
            changed += 1;
        }
        tracing::debug!("Renamed speaker {} to {} ({} segments)", old_id, new_id, changed);
        Ok(changed)
    }
}

/// Persisted segment layout: index → segment and index → voice override.
///
/// Gaps in the index space are allowed; `segments()` returns the segments in
/// index order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentLayout {
    /// Segments keyed by their position in the timeline
    #[serde(default)]
    pub segments: BTreeMap<usize, Segment>,
    /// Per-segment voice overrides
    #[serde(default)]
    pub voice_overrides: BTreeMap<usize, String>,
}

impl SegmentLayout {
    /// Build a layout from an ordered segment list
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self {
            segments: segments.iter().cloned().enumerate().collect(),
            voice_overrides: BTreeMap::new(),
        }
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Segments in index order
    pub fn segments(&self) -> Vec<Segment> {
        self.segments.values().cloned().collect()
    }

    /// Voice overrides re-keyed by position in `segments()`
    pub fn positional_overrides(&self) -> BTreeMap<usize, String> {
        self.segments
            .keys()
            .enumerate()
            .filter_map(|(position, key)| {
                self.voice_overrides
                    .get(key)
                    .map(|voice| (position, voice.clone()))
            })
            .collect()
    }

    /// Replace the text of one segment
    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        let segment = self
            .segments
            .get_mut(&index)
            .ok_or_else(|| Error::InvalidInput(format!("no segment at index {}", index)))?;
        segment.text = text.into();
        Ok(())
    }

    /// Set or clear the voice override of one segment
    pub fn set_voice_override(&mut self, index: usize, voice: Option<String>) -> Result<()> {
        if !self.segments.contains_key(&index) {
            return Err(Error::InvalidInput(format!("no segment at index {}", index)));
        }
        match voice {
            Some(voice) => {
                self.voice_overrides.insert(index, voice);
            }
            None => {
                self.voice_overrides.remove(&index);
            }
        }
        Ok(())
    }
}
