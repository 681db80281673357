//! Integration tests for the export merger
//!
//! Uses a scripted recorder backend on paused tokio time:
//! 1. Recording stops at track duration + 0.5s, never earlier
//! 2. Non-empty chunks are concatenated in arrival order
//! 3. Missing video, recorder errors and setup failures propagate
//! 4. The backend is released on every path

use std::time::Duration;

use async_trait::async_trait;
use dubsync_core::audio::MasterTrack;
use dubsync_core::config::ExportConfig;
use dubsync_core::export::{ExportMerger, MuxBackend, RecorderEvent, TrackHandle};
use dubsync_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Default)]
struct MockBackend {
    no_video: bool,
    fail_audio_tap: bool,
    recorder_error: Option<String>,
    stop_immediately: bool,
    chunks: Vec<Vec<u8>>,
    final_chunk: Vec<u8>,

    tx: Option<mpsc::UnboundedSender<RecorderEvent>>,
    mime_type: Option<String>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    audio_started: bool,
    released: bool,
}

#[async_trait]
impl MuxBackend for MockBackend {
    async fn open_visual(&mut self, video: &[u8]) -> Result<Option<TrackHandle>> {
        assert_eq!(video, b"reference-video");
        Ok((!self.no_video).then_some(TrackHandle(1)))
    }

    async fn open_audio_tap(&mut self, track: &MasterTrack) -> Result<TrackHandle> {
        if self.fail_audio_tap {
            return Err(Error::Host("audio engine unavailable".into()));
        }
        assert!(!track.is_empty());
        Ok(TrackHandle(2))
    }

    async fn start_recording(
        &mut self,
        visual: TrackHandle,
        audio: TrackHandle,
        mime_type: &str,
    ) -> Result<mpsc::UnboundedReceiver<RecorderEvent>> {
        assert_eq!((visual, audio), (TrackHandle(1), TrackHandle(2)));
        let (tx, rx) = mpsc::unbounded_channel();

        for chunk in &self.chunks {
            let _ = tx.send(RecorderEvent::Chunk(chunk.clone()));
        }
        if let Some(message) = &self.recorder_error {
            let _ = tx.send(RecorderEvent::Error(message.clone()));
        }
        if self.stop_immediately {
            let _ = tx.send(RecorderEvent::Stopped);
        }

        self.tx = Some(tx);
        self.mime_type = Some(mime_type.to_string());
        self.started_at = Some(Instant::now());
        Ok(rx)
    }

    async fn start_audio(&mut self) -> Result<()> {
        self.audio_started = true;
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.stopped_at = Some(Instant::now());
        if let Some(tx) = &self.tx {
            let _ = tx.send(RecorderEvent::Chunk(self.final_chunk.clone()));
            let _ = tx.send(RecorderEvent::Stopped);
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.tx = None;
        self.released = true;
    }
}

/// Two seconds of audio at 24 kHz
fn track() -> MasterTrack {
    MasterTrack::new(vec![0.1; 48_000], 24_000)
}

#[tokio::test(start_paused = true)]
async fn test_stop_fires_after_duration_plus_padding() {
    let mut backend = MockBackend {
        chunks: vec![vec![1, 2], Vec::new(), vec![3]],
        final_chunk: vec![4],
        ..Default::default()
    };

    let media = ExportMerger::default()
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap();

    let elapsed = backend.stopped_at.unwrap() - backend.started_at.unwrap();
    assert!(elapsed >= Duration::from_millis(2_500), "stopped early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2_520), "stopped late: {:?}", elapsed);

    assert_eq!(media.bytes, vec![1, 2, 3, 4]);
    assert_eq!(media.mime_type, "video/webm; codecs=vp9,opus");
    assert_eq!(media.extension(), "webm");
    assert!(backend.audio_started);
    assert!(backend.released);
}

#[tokio::test(start_paused = true)]
async fn test_configured_padding_and_mime_type() {
    let mut backend = MockBackend {
        final_chunk: vec![9],
        ..Default::default()
    };
    let merger = ExportMerger::new(ExportConfig {
        stop_padding_secs: 1.0,
        mime_type: "video/mp4".into(),
    })
    .unwrap();

    let media = merger
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap();

    let elapsed = backend.stopped_at.unwrap() - backend.started_at.unwrap();
    assert!(elapsed >= Duration::from_secs(3));
    assert_eq!(backend.mime_type.as_deref(), Some("video/mp4"));
    assert_eq!(media.bytes, vec![9]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_video_track() {
    let mut backend = MockBackend {
        no_video: true,
        ..Default::default()
    };

    let err = ExportMerger::default()
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoVideoTrack));
    assert!(backend.started_at.is_none());
    assert!(backend.released);
}

#[tokio::test(start_paused = true)]
async fn test_recorder_error_discards_partial_output() {
    let mut backend = MockBackend {
        chunks: vec![vec![1, 2, 3]],
        recorder_error: Some("encoder crashed".into()),
        ..Default::default()
    };

    let err = ExportMerger::default()
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RecorderFailure(ref m) if m == "encoder crashed"));
    assert!(backend.stopped_at.is_none());
    assert!(backend.released);
}

#[tokio::test(start_paused = true)]
async fn test_premature_stop_is_a_failure() {
    let mut backend = MockBackend {
        stop_immediately: true,
        ..Default::default()
    };

    let err = ExportMerger::default()
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RecorderFailure(_)));
    assert!(backend.released);
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_still_releases() {
    let mut backend = MockBackend {
        fail_audio_tap: true,
        ..Default::default()
    };

    let err = ExportMerger::default()
        .merge(&mut backend, b"reference-video", &track())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Host(_)));
    assert!(backend.started_at.is_none());
    assert!(backend.released);
}
