//! Audio + video export
//!
//! Records the reference video's picture together with the master track into
//! one container. The host side (decoder, capture, recorder) sits behind
//! [`MuxBackend`]; the merger drives it through a fixed sequence:
//!
//! 1. open the reference video muted and grab its visual track
//! 2. open an audio-only tap playing the master track
//! 3. start recording the combined stream and the tap together
//! 4. stop recording at `track duration + stop padding`
//! 5. concatenate the recorder's non-empty chunks in arrival order
//!
//! The backend is released on every path, including errors.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::MasterTrack;
use crate::config::ExportConfig;
use crate::error::{Error, Result};

/// Opaque host handle for a capturable track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub u64);

/// Output of a running recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A piece of the encoded container (may be empty)
    Chunk(Vec<u8>),
    /// The recorder failed
    Error(String),
    /// The recorder flushed its last chunk after a stop request
    Stopped,
}

/// Host media stack used by [`ExportMerger`]
#[async_trait]
pub trait MuxBackend: Send {
    /// Load the reference video muted; `None` if it has no capturable picture
    async fn open_visual(&mut self, video: &[u8]) -> Result<Option<TrackHandle>>;

    /// Prepare an audio-only source over the master track, not yet playing
    async fn open_audio_tap(&mut self, track: &MasterTrack) -> Result<TrackHandle>;

    /// Start recording `visual` + `audio` into `mime_type`, starting the
    /// reference video from 0
    async fn start_recording(
        &mut self,
        visual: TrackHandle,
        audio: TrackHandle,
        mime_type: &str,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>>;

    /// Start the audio tap from position 0
    async fn start_audio(&mut self) -> Result<()>;

    /// Ask the recorder to stop; it answers with `RecorderEvent::Stopped`
    async fn stop_recording(&mut self) -> Result<()>;

    /// Stop playback and free every host resource
    async fn release(&mut self);
}

/// A finished export
#[derive(Clone, PartialEq, Eq)]
pub struct ExportedMedia {
    /// Container mime type
    pub mime_type: String,
    /// Container bytes
    pub bytes: Vec<u8>,
}

impl ExportedMedia {
    /// File extension for the container, e.g. "webm"
    pub fn extension(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .and_then(|essence| essence.split('/').nth(1))
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

impl std::fmt::Debug for ExportedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExportedMedia({}, {} bytes)", self.mime_type, self.bytes.len())
    }
}

/// Muxes a master track with a reference video
#[derive(Debug, Clone, Default)]
pub struct ExportMerger {
    config: ExportConfig,
}

impl ExportMerger {
    /// Create a merger; fails with `ConfigError` on an unusable stop padding
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// How long recording runs for `track`
    pub fn recording_length(&self, track: &MasterTrack) -> Duration {
        Duration::from_secs_f64((track.duration_secs() + self.config.stop_padding_secs).max(0.0))
    }

    /// Record `video` + `track` through `backend`
    pub async fn merge<B>(
        &self,
        backend: &mut B,
        video: &[u8],
        track: &MasterTrack,
    ) -> Result<ExportedMedia>
    where
        B: MuxBackend + ?Sized,
    {
        tracing::info!(
            "Starting export: {:?}, recording for {:?}",
            track,
            self.recording_length(track)
        );

        let result = self.record(backend, video, track).await;
        backend.release().await;

        match &result {
            Ok(media) => tracing::info!("Export complete: {:?}", media),
            Err(e) => tracing::warn!("Export failed: {}", e),
        }
        result
    }

    async fn record<B>(
        &self,
        backend: &mut B,
        video: &[u8],
        track: &MasterTrack,
    ) -> Result<ExportedMedia>
    where
        B: MuxBackend + ?Sized,
    {
        let visual = backend
            .open_visual(video)
            .await?
            .ok_or(Error::NoVideoTrack)?;
        let audio = backend.open_audio_tap(track).await?;

        let mut events = backend
            .start_recording(visual, audio, &self.config.mime_type)
            .await?;
        backend.start_audio().await?;

        let timer = tokio::time::sleep(self.recording_length(track));
        tokio::pin!(timer);

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut stop_requested = false;

        loop {
            tokio::select! {
                _ = &mut timer, if !stop_requested => {
                    tracing::debug!("Recording length reached; stopping recorder");
                    backend.stop_recording().await?;
                    stop_requested = true;
                }

                event = events.recv() => match event {
                    Some(RecorderEvent::Chunk(data)) => {
                        if !data.is_empty() {
                            chunks.push(data);
                        }
                    }
                    Some(RecorderEvent::Error(message)) => {
                        return Err(Error::RecorderFailure(message));
                    }
                    Some(RecorderEvent::Stopped) if stop_requested => break,
                    Some(RecorderEvent::Stopped) => {
                        return Err(Error::RecorderFailure(
                            "recorder stopped before the track finished".into(),
                        ));
                    }
                    None => {
                        return Err(Error::RecorderFailure("recorder output closed".into()));
                    }
                },
            }
        }

        tracing::debug!("Recorder produced {} chunks", chunks.len());
        Ok(ExportedMedia {
            mime_type: self.config.mime_type.clone(),
            bytes: chunks.concat(),
        })
    }
}
