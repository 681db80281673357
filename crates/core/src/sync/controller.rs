//! Drift-correcting playback state machine

use crate::audio::MasterTrack;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::sync::{AudioOutput, AudioSession, ClockEvent, ReferenceClock};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No source scheduled
    Stopped,
    /// A source is scheduled (or will be once a track is loaded)
    Playing,
}

/// Point from which the source position is projected
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Engine clock at the last (re)schedule or rate change
    pub clock: f64,
    /// Track position at that moment, in seconds
    pub position: f64,
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Drift within tolerance at the user rate
    None,
    /// Drift within tolerance; the rate was reset to the user rate
    Relaxed,
    /// Rate nudged to the given value
    Soft {
        /// New applied rate
        rate: f64,
    },
    /// Source restarted at the target position
    Hard,
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Target minus projected position, in seconds
    pub drift: f64,
    /// Action taken
    pub correction: Correction,
}

/// Counters for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Ticks evaluated while playing
    pub ticks: u64,
    /// Drift-triggered source restarts
    pub hard_resyncs: u64,
    /// Rate nudges
    pub soft_corrections: u64,
    /// Largest |drift| observed, in seconds
    pub max_drift_secs: f64,
}

/// Keeps a master track in lockstep with a reference clock
pub struct SyncController<C: ReferenceClock, A: AudioOutput> {
    clock: C,
    session: AudioSession<A>,
    config: SyncConfig,
    track: Option<MasterTrack>,
    state: PlaybackState,
    anchor: Option<Anchor>,
    user_rate: f64,
    applied_rate: f64,
    offset_ms: f64,
    stats: SyncStats,
    torn_down: bool,
}

impl<C: ReferenceClock, A: AudioOutput> SyncController<C, A> {
    /// Create a stopped controller owning the reference clock and audio engine.
    ///
    /// Fails with `ConfigError` when `config` does not validate.
    pub fn new(clock: C, output: A, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            session: AudioSession::new(output),
            config,
            track: None,
            state: PlaybackState::Stopped,
            anchor: None,
            user_rate: 1.0,
            applied_rate: 1.0,
            offset_ms: 0.0,
            stats: SyncStats::default(),
            torn_down: false,
        })
    }

    /// Builder: start with a track loaded
    pub fn with_track(mut self, track: MasterTrack) -> Self {
        self.track = Some(track);
        self
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether a source is (or will be) scheduled
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Anchor of the running source; `None` while stopped
    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Playback rate requested by the host
    pub fn user_rate(&self) -> f64 {
        self.user_rate
    }

    /// Rate currently applied to the source, including any nudge
    pub fn applied_rate(&self) -> f64 {
        self.applied_rate
    }

    /// Audio offset relative to the reference, in milliseconds
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SyncStats {
        self.stats.clone()
    }

    /// Thresholds and gain in effect
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The reference clock
    pub fn reference(&self) -> &C {
        &self.clock
    }

    /// The reference clock, mutably (hosts and tests drive it through here)
    pub fn reference_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The audio engine
    pub fn output(&self) -> &A {
        self.session.output()
    }

    /// The audio engine, mutably
    pub fn output_mut(&mut self) -> &mut A {
        self.session.output_mut()
    }

    /// Whether `teardown` has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Where the source should be, from the reference clock and offset
    pub fn target_position(&self) -> f64 {
        (self.clock.current_time() + self.offset_ms / 1000.0).max(0.0)
    }

    /// Where the source is, projected from the anchor
    pub fn projected_position(&self) -> Option<f64> {
        self.anchor.map(|anchor| {
            anchor.position + (self.session.current_time() - anchor.clock) * self.applied_rate
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.torn_down {
            return Err(Error::InvalidInput("sync session already torn down".into()));
        }
        Ok(())
    }

    /// Restart the source at the target position with the user rate
    fn schedule(&mut self) -> Result<()> {
        let Some(track) = self.track.as_ref() else {
            tracing::debug!("No master track loaded; playback waits for one");
            self.anchor = None;
            return Ok(());
        };

        let position = self.target_position();
        self.session.start(track, position, self.user_rate)?;
        self.anchor = Some(Anchor {
            clock: self.session.current_time(),
            position,
        });
        self.applied_rate = self.user_rate;
        tracing::debug!(
            "Scheduled source at {:.3}s (rate {:.3})",
            position,
            self.user_rate
        );
        Ok(())
    }

    /// Keep the reference's own audio muted; returns whether it had to be
    /// re-muted
    pub fn enforce_mute(&mut self) -> bool {
        if self.clock.is_muted() {
            return false;
        }
        self.clock.set_muted(true);
        tracing::debug!("Reference audio was unmuted; muting again");
        true
    }

    /// Start (or restart) playback from the reference position
    pub fn play(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.enforce_mute();
        self.state = PlaybackState::Playing;
        self.schedule()
    }

    /// Stop the source and cancel ticking
    pub fn pause(&mut self) {
        self.session.stop();
        self.state = PlaybackState::Stopped;
        self.anchor = None;
        self.applied_rate = self.user_rate;
    }

    /// Reference reached its end; same as pause
    pub fn end(&mut self) {
        self.pause();
    }

    /// Reference jumped. While playing the source is restarted immediately;
    /// otherwise the next `play` picks up the new position.
    pub fn seek(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.is_playing() {
            self.schedule()?;
        }
        Ok(())
    }

    /// Change the user playback rate
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.ensure_open()?;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidInput(format!(
                "playback rate must be positive, got {}",
                rate
            )));
        }
        self.user_rate = rate;
        if self.is_playing() {
            self.schedule()
        } else {
            self.applied_rate = rate;
            Ok(())
        }
    }

    /// Change the audio offset in milliseconds (positive plays later audio)
    pub fn set_offset_ms(&mut self, offset_ms: f64) -> Result<()> {
        self.ensure_open()?;
        if !offset_ms.is_finite() {
            return Err(Error::InvalidInput(format!("invalid offset {}", offset_ms)));
        }
        self.offset_ms = offset_ms;
        if self.is_playing() {
            self.schedule()?;
        }
        Ok(())
    }

    /// Replace the master track
    pub fn load_track(&mut self, track: MasterTrack) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("Loading {:?}", track);
        self.track = Some(track);
        if self.is_playing() {
            self.schedule()?;
        }
        Ok(())
    }

    /// Evaluate drift once. Returns `None` when not playing.
    pub fn tick(&mut self) -> Result<Option<TickReport>> {
        if self.torn_down || !self.is_playing() {
            return Ok(None);
        }
        let Some(expected) = self.projected_position() else {
            return Ok(None);
        };

        self.stats.ticks += 1;
        let drift = self.target_position() - expected;
        let magnitude = drift.abs();
        self.stats.max_drift_secs = self.stats.max_drift_secs.max(magnitude);

        let correction = if magnitude > self.config.hard_threshold_secs {
            tracing::warn!(
                "Drift {:.3}s exceeds {:.3}s; restarting audio source",
                drift,
                self.config.hard_threshold_secs
            );
            self.schedule()?;
            self.stats.hard_resyncs += 1;
            Correction::Hard
        } else if magnitude > self.config.soft_threshold_secs {
            let low = self.user_rate * (1.0 - self.config.max_rate_deviation);
            let high = self.user_rate * (1.0 + self.config.max_rate_deviation);
            let rate = (self.user_rate + drift * self.config.correction_gain).clamp(low, high);
            self.rebase(expected, rate)?;
            self.stats.soft_corrections += 1;
            tracing::debug!("Drift {:.3}s; rate nudged to {:.4}", drift, rate);
            Correction::Soft { rate }
        } else if self.applied_rate != self.user_rate {
            self.rebase(expected, self.user_rate)?;
            Correction::Relaxed
        } else {
            Correction::None
        };

        Ok(Some(TickReport { drift, correction }))
    }

    /// Move the anchor to the projected position and switch rate
    fn rebase(&mut self, position: f64, rate: f64) -> Result<()> {
        self.anchor = Some(Anchor {
            clock: self.session.current_time(),
            position,
        });
        self.applied_rate = rate;
        self.session.set_rate(rate)
    }

    /// Dispatch a host event
    pub fn handle_event(&mut self, event: ClockEvent) -> Result<()> {
        match event {
            ClockEvent::Play => self.play(),
            ClockEvent::Pause => {
                self.pause();
                Ok(())
            }
            ClockEvent::Ended => {
                self.end();
                Ok(())
            }
            ClockEvent::Seeked => self.seek(),
            ClockEvent::VolumeChanged => {
                self.enforce_mute();
                Ok(())
            }
            ClockEvent::RateChanged(rate) => self.set_playback_rate(rate),
            ClockEvent::OffsetChanged(offset_ms) => self.set_offset_ms(offset_ms),
            ClockEvent::TrackLoaded(track) => self.load_track(track),
        }
    }

    /// Stop the source and close the audio session. Nothing runs afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.pause();
        self.session.close();
        self.torn_down = true;
        tracing::info!(
            "Sync session closed: {} ticks, {} hard resyncs, {} soft corrections, max drift {:.3}s",
            self.stats.ticks,
            self.stats.hard_resyncs,
            self.stats.soft_corrections,
            self.stats.max_drift_secs
        );
    }
}
