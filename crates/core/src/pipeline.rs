//! Dubbing pipeline: analysis → clip generation → stitching
//!
//! The pipeline always rebuilds the whole master track; edits to a
//! [`SegmentLayout`] are applied by rendering the layout again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::MasterTrack;
use crate::config::DubConfig;
use crate::error::{Error, Result};
use crate::generation::{
    ClipBatcher, ClipGenerator, VoiceOverrides, VoiceSample, VoiceSelection,
};
use crate::timeline::{
    validate_timeline, AnalysisResult, Segment, SegmentLayout, SpeakerProfile, StitchReport,
    Stitcher,
};

/// External diarization / transcription service
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze an encoded video and return speakers and timed segments
    async fn analyze(&self, video: &[u8]) -> Result<AnalysisResult>;
}

/// Result of one render
#[derive(Debug)]
pub struct RenderedDub {
    /// The assembled master track
    pub track: MasterTrack,
    /// Placement statistics
    pub report: StitchReport,
    /// Segments that rendered as silence, as `Error::ClipGeneration`
    pub failures: Vec<Error>,
}

/// Orchestrates generation and stitching for one project
pub struct DubbingPipeline {
    batcher: ClipBatcher,
    stitcher: Stitcher,
}

impl DubbingPipeline {
    /// Create a pipeline from configuration
    pub fn new(generator: Arc<dyn ClipGenerator>, config: &DubConfig) -> Self {
        Self {
            batcher: ClipBatcher::from_config(generator, &config.generation),
            stitcher: Stitcher::from_config(config.audio.sample_rate, &config.stitch),
        }
    }

    /// The stitcher used for rendering
    pub fn stitcher(&self) -> &Stitcher {
        &self.stitcher
    }

    /// Run analysis and check the result is renderable
    pub async fn analyze(&self, analyzer: &dyn Analyzer, video: &[u8]) -> Result<AnalysisResult> {
        let analysis = analyzer.analyze(video).await?;
        validate_timeline(&analysis.segments)?;
        tracing::info!(
            "Analysis complete: language={}, {} speakers, {} segments",
            analysis.language,
            analysis.speakers.len(),
            analysis.segments.len()
        );
        Ok(analysis)
    }

    /// Generate every clip and stitch the master track
    pub async fn render(
        &self,
        segments: &[Segment],
        speakers: &[SpeakerProfile],
        selection: &VoiceSelection,
        overrides: &VoiceOverrides,
        reference: Option<&VoiceSample>,
    ) -> Result<RenderedDub> {
        let batch = self
            .batcher
            .generate(segments, speakers, selection, overrides, reference)
            .await?;

        let (track, report) = self.stitcher.stitch_with_report(segments, &batch.clips)?;

        if !batch.failures.is_empty() {
            tracing::warn!(
                "{} of {} segments rendered as silence",
                batch.failures.len(),
                segments.len()
            );
        }

        Ok(RenderedDub {
            track,
            report,
            failures: batch.failures,
        })
    }

    /// Rebuild the master track from a persisted layout
    pub async fn render_layout(
        &self,
        layout: &SegmentLayout,
        speakers: &[SpeakerProfile],
        selection: &VoiceSelection,
        reference: Option<&VoiceSample>,
    ) -> Result<RenderedDub> {
        let segments = layout.segments();
        let overrides = layout.positional_overrides();
        self.render(&segments, speakers, selection, &overrides, reference)
            .await
    }
}
