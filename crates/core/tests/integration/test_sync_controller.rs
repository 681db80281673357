//! Integration tests for the playback sync controller and its driver task
//!
//! Validates drift correction against scripted clocks:
//! 1. A 0.30s drift causes exactly one hard resync onto the reference position
//! 2. A held 0.08s drift only ever nudges the rate, within ±10% of the user rate
//!    (0.25s is still soft, 0.05s relaxes, negative drift slows down)
//! 3. Seeks, rate changes and late track loads reschedule the source
//! 4. The driver ticks only while playing and closes the session on shutdown

use std::sync::Arc;
use std::time::Duration;

use dubsync_core::audio::MasterTrack;
use dubsync_core::config::SyncConfig;
use dubsync_core::sync::{
    self, AudioOutput, ClockEvent, Correction, PlaybackState, ReferenceClock, SyncController,
};
use dubsync_core::Result;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Default)]
struct VideoState {
    time: f64,
    muted: bool,
}

/// Reference clock: scripted time, optionally advancing with tokio time
#[derive(Clone, Default)]
struct MockVideo {
    state: Arc<Mutex<VideoState>>,
    live_since: Option<Instant>,
}

impl MockVideo {
    fn live() -> Self {
        Self {
            live_since: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn set_time(&self, time: f64) {
        self.state.lock().time = time;
    }

    fn unmute(&self) {
        self.state.lock().muted = false;
    }

    fn muted(&self) -> bool {
        self.state.lock().muted
    }
}

impl ReferenceClock for MockVideo {
    fn current_time(&self) -> f64 {
        let elapsed = self
            .live_since
            .map_or(0.0, |since| since.elapsed().as_secs_f64());
        self.state.lock().time + elapsed
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }
}

#[derive(Default)]
struct EngineState {
    now: f64,
    starts: Vec<(f64, f64)>,
    rates: Vec<f64>,
    stops: usize,
    closed: bool,
}

/// Audio engine recording every call
#[derive(Clone, Default)]
struct MockEngine {
    state: Arc<Mutex<EngineState>>,
    live_since: Option<Instant>,
}

impl MockEngine {
    fn live() -> Self {
        Self {
            live_since: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn advance(&self, secs: f64) {
        self.state.lock().now += secs;
    }

    fn starts(&self) -> Vec<(f64, f64)> {
        self.state.lock().starts.clone()
    }

    fn closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl AudioOutput for MockEngine {
    fn current_time(&self) -> f64 {
        let elapsed = self
            .live_since
            .map_or(0.0, |since| since.elapsed().as_secs_f64());
        self.state.lock().now + elapsed
    }

    fn start_source(&mut self, _track: &MasterTrack, position_secs: f64, rate: f64) -> Result<()> {
        self.state.lock().starts.push((position_secs, rate));
        Ok(())
    }

    fn set_source_rate(&mut self, rate: f64) -> Result<()> {
        self.state.lock().rates.push(rate);
        Ok(())
    }

    fn stop_source(&mut self) {
        self.state.lock().stops += 1;
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }
}

fn track() -> MasterTrack {
    MasterTrack::new(vec![0.0; 24_000 * 60], 24_000)
}

fn controller(video: &MockVideo, engine: &MockEngine) -> SyncController<MockVideo, MockEngine> {
    SyncController::new(video.clone(), engine.clone(), SyncConfig::default())
        .unwrap()
        .with_track(track())
}

#[test]
fn test_large_drift_triggers_one_hard_resync() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);

    video.set_time(10.0);
    sync.play().unwrap();
    assert_eq!(engine.starts(), vec![(10.0, 1.0)]);

    // Engine advanced 1.0s, video jumped 1.30s
    engine.advance(1.0);
    video.set_time(11.30);
    let report = sync.tick().unwrap().unwrap();

    assert_eq!(report.correction, Correction::Hard);
    assert!((report.drift - 0.30).abs() < 1e-9);
    assert_eq!(sync.stats().hard_resyncs, 1);
    assert_eq!(engine.starts().len(), 2);

    let anchor = sync.anchor().unwrap();
    assert_eq!(anchor.position, 11.30);
    assert_eq!(anchor.clock, 1.0);
    assert_eq!(sync.applied_rate(), 1.0);

    // Back in lockstep: no further resync
    engine.advance(0.016);
    video.set_time(11.316);
    let report = sync.tick().unwrap().unwrap();
    assert_eq!(report.correction, Correction::None);
    assert_eq!(sync.stats().hard_resyncs, 1);
    assert_eq!(engine.starts().len(), 2);
}

#[test]
fn test_held_moderate_drift_stays_within_rate_bounds() {
    for user_rate in [1.0, 1.5, 0.5] {
        let video = MockVideo::default();
        let engine = MockEngine::default();
        let mut sync = controller(&video, &engine);
        sync.set_playback_rate(user_rate).unwrap();
        sync.play().unwrap();

        for _ in 0..300 {
            engine.advance(0.016);
            let projected = sync.projected_position().unwrap();
            video.set_time(projected + 0.08);

            let report = sync.tick().unwrap().unwrap();
            assert!(matches!(report.correction, Correction::Soft { .. }));

            let rate = sync.applied_rate();
            assert!(rate >= user_rate * 0.9 - 1e-12, "rate {} below bound", rate);
            assert!(rate <= user_rate * 1.1 + 1e-12, "rate {} above bound", rate);
        }

        let stats = sync.stats();
        assert_eq!(stats.hard_resyncs, 0);
        assert_eq!(stats.soft_corrections, 300);
        assert_eq!(engine.starts().len(), 1);
    }
}

#[test]
fn test_soft_rate_is_clamped() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);
    sync.play().unwrap();

    // 0.24s drift: 1.0 + 0.12 would exceed the +10% bound
    engine.advance(1.0);
    video.set_time(1.24);
    let report = sync.tick().unwrap().unwrap();

    assert_eq!(report.correction, Correction::Soft { rate: 1.1 });
    assert_eq!(sync.applied_rate(), 1.1);
    assert_eq!(engine.state.lock().rates, vec![1.1]);
}

#[test]
fn test_drift_at_hard_threshold_is_soft() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);
    sync.play().unwrap();

    engine.advance(1.0);
    video.set_time(1.25);
    let report = sync.tick().unwrap().unwrap();

    assert_eq!(report.drift, 0.25);
    assert_eq!(report.correction, Correction::Soft { rate: 1.1 });
    assert_eq!(sync.stats().hard_resyncs, 0);
    assert_eq!(engine.starts().len(), 1);
}

#[test]
fn test_drift_at_soft_threshold_relaxes_rate() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);
    sync.play().unwrap();

    // Engine clock held at 0 so every projection is exactly 0.0
    video.set_time(0.25);
    let report = sync.tick().unwrap().unwrap();
    assert!(matches!(report.correction, Correction::Soft { .. }));
    assert_eq!(sync.projected_position(), Some(0.0));

    video.set_time(0.05);
    let report = sync.tick().unwrap().unwrap();

    assert_eq!(report.drift, 0.05);
    assert_eq!(report.correction, Correction::Relaxed);
    assert_eq!(sync.applied_rate(), 1.0);
    assert_eq!(engine.state.lock().rates, vec![1.1, 1.0]);
    assert_eq!(sync.stats().soft_corrections, 1);
}

#[test]
fn test_negative_drift_clamps_to_lower_bound() {
    for user_rate in [1.0, 0.5] {
        let video = MockVideo::default();
        let engine = MockEngine::default();
        let mut sync = controller(&video, &engine);
        sync.set_playback_rate(user_rate).unwrap();
        sync.play().unwrap();

        // Audio 0.24s ahead of the reference
        engine.advance(1.0);
        video.set_time(user_rate - 0.24);
        let report = sync.tick().unwrap().unwrap();

        assert!(report.drift < 0.0);
        let Correction::Soft { rate } = report.correction else {
            panic!("expected a soft correction, got {:?}", report.correction);
        };
        assert!((rate - user_rate * 0.9).abs() < 1e-12, "rate {}", rate);
        assert_eq!(sync.applied_rate(), rate);
        assert_eq!(sync.stats().hard_resyncs, 0);
    }
}

#[test]
fn test_offset_shifts_target() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);

    video.set_time(5.0);
    sync.set_offset_ms(250.0).unwrap();
    sync.play().unwrap();
    assert_eq!(engine.starts(), vec![(5.25, 1.0)]);

    // Offset held constant is not drift
    engine.advance(1.0);
    video.set_time(6.0);
    let report = sync.tick().unwrap().unwrap();
    assert_eq!(report.correction, Correction::None);

    // Changing it while playing reschedules immediately
    sync.set_offset_ms(-100.0).unwrap();
    let (position, rate) = engine.starts()[1];
    assert!((position - 5.9).abs() < 1e-9);
    assert_eq!(rate, 1.0);
}

#[test]
fn test_seek_while_stopped_is_deferred() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);

    video.set_time(42.0);
    sync.seek().unwrap();
    assert!(engine.starts().is_empty());

    sync.play().unwrap();
    assert_eq!(engine.starts(), vec![(42.0, 1.0)]);

    video.set_time(7.0);
    sync.handle_event(ClockEvent::Seeked).unwrap();
    assert_eq!(engine.starts().last(), Some(&(7.0, 1.0)));
}

#[test]
fn test_pause_and_end_stop_the_source() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);

    sync.play().unwrap();
    sync.handle_event(ClockEvent::Pause).unwrap();
    assert_eq!(sync.state(), PlaybackState::Stopped);
    assert!(sync.anchor().is_none());
    assert_eq!(sync.tick().unwrap(), None);

    sync.play().unwrap();
    sync.handle_event(ClockEvent::Ended).unwrap();
    assert_eq!(sync.state(), PlaybackState::Stopped);
    assert_eq!(engine.state.lock().stops, 2);
}

#[test]
fn test_play_before_track_loaded() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync =
        SyncController::new(video.clone(), engine.clone(), SyncConfig::default()).unwrap();

    sync.play().unwrap();
    assert_eq!(sync.state(), PlaybackState::Playing);
    assert_eq!(sync.tick().unwrap(), None);
    assert!(engine.starts().is_empty());

    video.set_time(3.0);
    sync.load_track(track()).unwrap();
    assert_eq!(engine.starts(), vec![(3.0, 1.0)]);
    assert!(sync.tick().unwrap().is_some());
}

#[test]
fn test_unmute_is_reverted() {
    let video = MockVideo::default();
    let engine = MockEngine::default();
    let mut sync = controller(&video, &engine);

    sync.play().unwrap();
    assert!(video.muted());

    video.unmute();
    sync.handle_event(ClockEvent::VolumeChanged).unwrap();
    assert!(video.muted());
}

#[tokio::test(start_paused = true)]
async fn test_driver_ticks_only_while_playing() {
    let video = MockVideo::live();
    let engine = MockEngine::live();
    let handle = sync::spawn(controller(&video, &engine));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.stats().ticks, 0);

    handle.send(ClockEvent::Play).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let playing_ticks = handle.stats().ticks;
    assert!(playing_ticks >= 5, "only {} ticks while playing", playing_ticks);
    assert_eq!(handle.stats().hard_resyncs, 0);

    handle.send(ClockEvent::Pause).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let paused_ticks = handle.stats().ticks;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.stats().ticks, paused_ticks);

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.ticks, paused_ticks);
    assert!(engine.closed());
}

#[tokio::test(start_paused = true)]
async fn test_driver_corrects_injected_drift() {
    let video = MockVideo::live();
    let engine = MockEngine::live();
    let handle = sync::spawn(controller(&video, &engine));

    handle.send(ClockEvent::Play).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Video jumps ahead without a seek event
    video.set_time(0.4);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.hard_resyncs, 1);
    assert!(stats.max_drift_secs > 0.25);
    assert_eq!(engine.starts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_driver_enforces_mute_and_closes_on_shutdown() {
    let video = MockVideo::live();
    let engine = MockEngine::live();
    let handle = sync::spawn(controller(&video, &engine));

    handle.send(ClockEvent::Play).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(video.muted());

    video.unmute();
    handle.send(ClockEvent::VolumeChanged).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(video.muted());

    handle.shutdown().await.unwrap();
    assert!(engine.closed());
}
