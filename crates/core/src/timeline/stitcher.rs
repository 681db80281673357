//! Timeline stitching
//!
//! Places each segment's clip into one silent master buffer at
//! `round(startTime * sampleRate)`. Clips are never stretched: a clip runs for
//! its natural length, which may be shorter or longer than its nominal slot.
//!
//! # Buffer length
//!
//! ```text
//! len = ceil((max(endTime) + padding) * sampleRate)
//! ```
//!
//! # Overlaps
//!
//! Segments are processed in list order. With the default
//! [`OverlapPolicy::LastWriteWins`] a later clip overwrites any earlier
//! samples it covers.

use serde::{Deserialize, Serialize};

use crate::audio::{Clip, MasterTrack};
use crate::config::StitchConfig;
use crate::error::{Error, Result};
use crate::timeline::{timeline_end, validate_timeline, Segment};

/// How a clip combines with samples already written to its region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Later segments overwrite earlier ones
    #[default]
    LastWriteWins,
    /// Samples are summed (clamped later by the PCM encoder)
    Mix,
    /// Like `LastWriteWins`, but a clip never runs past its own `endTime`
    TruncateToSlot,
}

/// Summary of one stitch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StitchReport {
    /// Clips written into the track
    pub placed: usize,
    /// Segments left silent because their clip was empty
    pub empty: usize,
    /// Clips cut short by the buffer end (or their slot)
    pub truncated: usize,
}

/// Builds master tracks from segment clips
#[derive(Debug, Clone)]
pub struct Stitcher {
    sample_rate: u32,
    padding_secs: f64,
    policy: OverlapPolicy,
}

impl Stitcher {
    /// Create a stitcher with 0.5 s padding and last-write-wins overlaps
    pub fn new(sample_rate: u32) -> Self {
        let defaults = StitchConfig::default();
        Self {
            sample_rate,
            padding_secs: defaults.padding_secs,
            policy: defaults.overlap_policy,
        }
    }

    /// Create a stitcher from configuration
    pub fn from_config(sample_rate: u32, config: &StitchConfig) -> Self {
        Self {
            sample_rate,
            padding_secs: config.padding_secs,
            policy: config.overlap_policy,
        }
    }

    /// Set the overlap policy
    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sample rate of produced tracks
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples a track for `segments` will have
    pub fn track_len(&self, segments: &[Segment]) -> Result<usize> {
        validate_timeline(segments)?;
        let end = timeline_end(segments).ok_or(Error::EmptyTimeline)?;
        let len = ((end + self.padding_secs) * self.sample_rate as f64).ceil();
        if !len.is_finite() || len < 0.0 || len > isize::MAX as f64 {
            return Err(Error::InvalidInput(format!(
                "track of {} samples cannot be allocated",
                len
            )));
        }
        Ok(len as usize)
    }

    /// First sample index of a segment
    fn start_index(&self, segment: &Segment) -> usize {
        (segment.start_time * self.sample_rate as f64).round() as usize
    }

    /// Stitch `clips[i]` at `segments[i]` for every i.
    pub fn stitch(&self, segments: &[Segment], clips: &[Clip]) -> Result<MasterTrack> {
        self.stitch_with_report(segments, clips)
            .map(|(track, _report)| track)
    }

    /// Stitch and also return placement statistics
    pub fn stitch_with_report(
        &self,
        segments: &[Segment],
        clips: &[Clip],
    ) -> Result<(MasterTrack, StitchReport)> {
        if segments.len() != clips.len() {
            return Err(Error::InvalidInput(format!(
                "{} segments but {} clips",
                segments.len(),
                clips.len()
            )));
        }

        let len = self.track_len(segments)?;

        if clips.iter().all(Clip::is_empty) {
            return Err(Error::AllClipsFailed {
                count: segments.len(),
            });
        }

        let mut buffer = vec![0.0f32; len];
        let mut report = StitchReport::default();

        for (index, (segment, clip)) in segments.iter().zip(clips).enumerate() {
            if clip.is_empty() {
                tracing::debug!("Segment {} has no clip; leaving silence", index);
                report.empty += 1;
                continue;
            }

            let start = self.start_index(segment);
            let mut end = start.saturating_add(clip.len()).min(len);
            if self.policy == OverlapPolicy::TruncateToSlot {
                let slot_end = (segment.end_time * self.sample_rate as f64).round() as usize;
                end = end.min(slot_end.max(start));
            }
            if end <= start {
                tracing::debug!(
                    "Segment {} starts at sample {} beyond track end {}",
                    index,
                    start,
                    len
                );
                report.truncated += 1;
                continue;
            }

            let count = end - start;
            if count < clip.len() {
                report.truncated += 1;
            }

            let source = &clip.samples()[..count];
            let target = &mut buffer[start..end];
            match self.policy {
                OverlapPolicy::LastWriteWins | OverlapPolicy::TruncateToSlot => {
                    target.copy_from_slice(source);
                }
                OverlapPolicy::Mix => {
                    for (out, sample) in target.iter_mut().zip(source) {
                        *out += *sample;
                    }
                }
            }
            report.placed += 1;
        }

        tracing::info!(
            "Stitched master track: {} samples ({:.3}s), {} placed, {} silent, {} truncated",
            len,
            len as f64 / self.sample_rate as f64,
            report.placed,
            report.empty,
            report.truncated
        );

        Ok((MasterTrack::new(buffer, self.sample_rate), report))
    }
}
