//! Clip generation fan-out
//!
//! Speech synthesis lives in an external service behind [`ClipGenerator`].
//! This module decides which voice speaks each segment, fans the requests out
//! concurrently and fans the results back in as one batch in segment order.
//!
//! A failed or skipped segment yields an empty clip plus a
//! [`Error::ClipGeneration`] entry in the batch; it never fails the batch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::audio::Clip;
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::timeline::{validate_timeline, Gender, Segment, SpeakerProfile};

/// Speaker id → selected voice
pub type VoiceSelection = HashMap<String, String>;

/// Segment position → voice override
pub type VoiceOverrides = BTreeMap<usize, String>;

/// Reference recording used for voice cloning
#[derive(Clone)]
pub struct VoiceSample {
    /// Encoded audio bytes
    pub data: Vec<u8>,
    /// Mime type of `data`, e.g. "audio/wav"
    pub mime_type: String,
}

impl std::fmt::Debug for VoiceSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoiceSample({}, {} bytes)", self.mime_type, self.data.len())
    }
}

/// External speech synthesis service
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    /// Synthesize `text` with `voice_id`, returning mono 16-bit LE PCM at the
    /// master sample rate. Empty output means the service produced nothing.
    async fn generate_clip(
        &self,
        text: &str,
        voice_id: &str,
        reference: Option<&VoiceSample>,
    ) -> Result<Vec<u8>>;
}

/// Pick the voice for every segment: override first, then the speaker's
/// selection. Unknown speakers and speakers of unknown gender get no voice.
pub fn resolve_voices(
    segments: &[Segment],
    speakers: &[SpeakerProfile],
    selection: &VoiceSelection,
    overrides: &VoiceOverrides,
) -> Vec<Option<String>> {
    let speaker_map: HashMap<&str, &SpeakerProfile> =
        speakers.iter().map(|s| (s.id.as_str(), s)).collect();

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let speaker = match speaker_map.get(segment.speaker_id.as_str()) {
                Some(speaker) if speaker.gender != Gender::Unknown => speaker,
                _ => {
                    tracing::warn!(
                        "Skipping segment {} for unknown or invalid-gender speaker: {}",
                        index,
                        segment.speaker_id
                    );
                    return None;
                }
            };

            let voice = overrides
                .get(&index)
                .or_else(|| selection.get(&speaker.id))
                .filter(|voice| !voice.is_empty())
                .cloned();
            if voice.is_none() {
                tracing::warn!(
                    "No voice selected for speaker {} (segment {}), skipping segment",
                    speaker.id,
                    index
                );
            }
            voice
        })
        .collect()
}

/// Generate one clip, trying voice cloning first when a sample is available
/// and falling back to the plain prebuilt voice.
///
/// Blank text yields no audio without calling the generator.
pub async fn generate_with_fallback(
    generator: &dyn ClipGenerator,
    text: &str,
    voice_id: &str,
    reference: Option<&VoiceSample>,
) -> Result<Vec<u8>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    if let Some(sample) = reference {
        match generator.generate_clip(text, voice_id, Some(sample)).await {
            Ok(pcm) if !pcm.is_empty() => return Ok(pcm),
            Ok(_) => tracing::warn!(
                "Voice cloning with {} returned no audio, falling back to prebuilt voice",
                voice_id
            ),
            Err(e) => tracing::warn!(
                "Voice cloning with {} failed ({}), falling back to prebuilt voice",
                voice_id,
                e
            ),
        }
    }

    generator.generate_clip(text, voice_id, None).await
}

/// Clips for a whole timeline, in segment order
#[derive(Debug, Default)]
pub struct ClipBatch {
    /// One clip per segment; empty where generation failed or was skipped
    pub clips: Vec<Clip>,
    /// `Error::ClipGeneration` for every empty clip
    pub failures: Vec<Error>,
}

impl ClipBatch {
    /// Number of segments that produced audio
    pub fn succeeded(&self) -> usize {
        self.clips.iter().filter(|c| !c.is_empty()).count()
    }
}

/// Fans clip requests out to a [`ClipGenerator`]
#[derive(Clone)]
pub struct ClipBatcher {
    generator: Arc<dyn ClipGenerator>,
    max_concurrent: Option<usize>,
}

impl ClipBatcher {
    /// Create a batcher with no concurrency limit
    pub fn new(generator: Arc<dyn ClipGenerator>) -> Self {
        Self {
            generator,
            max_concurrent: None,
        }
    }

    /// Create a batcher from configuration
    pub fn from_config(generator: Arc<dyn ClipGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            max_concurrent: config.max_concurrent_clips,
        }
    }

    /// Limit in-flight generator calls
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = Some(limit.max(1));
        self
    }

    async fn generate_one(
        &self,
        index: usize,
        segment: &Segment,
        voice: Option<String>,
        reference: Option<&VoiceSample>,
    ) -> (Clip, Option<Error>) {
        let failed = |reason: String| {
            tracing::warn!("Clip generation failed for segment {}: {}", index, reason);
            (Clip::empty(), Some(Error::ClipGeneration { index, reason }))
        };

        let Some(voice) = voice else {
            return failed("no voice assigned".to_string());
        };

        match generate_with_fallback(self.generator.as_ref(), &segment.text, &voice, reference)
            .await
        {
            Ok(pcm) if pcm.is_empty() => failed("generator returned no audio".to_string()),
            Ok(pcm) => match Clip::from_pcm16(&pcm) {
                Ok(clip) => {
                    tracing::debug!("Segment {} clip: {} samples", index, clip.len());
                    (clip, None)
                }
                Err(e) => failed(e.to_string()),
            },
            Err(e) => failed(e.to_string()),
        }
    }

    /// Generate a clip for every segment.
    ///
    /// Fails only with `EmptyTimeline` / `InvalidSegment`, before any request
    /// is made. Per-segment failures are collected in the batch.
    pub async fn generate(
        &self,
        segments: &[Segment],
        speakers: &[SpeakerProfile],
        selection: &VoiceSelection,
        overrides: &VoiceOverrides,
        reference: Option<&VoiceSample>,
    ) -> Result<ClipBatch> {
        validate_timeline(segments)?;

        let voices = resolve_voices(segments, speakers, selection, overrides);
        let tasks: Vec<_> = segments
            .iter()
            .zip(voices)
            .enumerate()
            .map(|(index, (segment, voice))| self.generate_one(index, segment, voice, reference))
            .collect();

        tracing::info!(
            "Generating {} clips (max concurrent: {:?})",
            tasks.len(),
            self.max_concurrent
        );

        let results: Vec<(Clip, Option<Error>)> = match self.max_concurrent {
            Some(limit) => stream::iter(tasks).buffered(limit).collect().await,
            None => futures::future::join_all(tasks).await,
        };

        let mut batch = ClipBatch::default();
        for (clip, failure) in results {
            batch.clips.push(clip);
            batch.failures.extend(failure);
        }

        tracing::info!(
            "Clip batch complete: {}/{} succeeded",
            batch.succeeded(),
            batch.clips.len()
        );
        Ok(batch)
    }
}
