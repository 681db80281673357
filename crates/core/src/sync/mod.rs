//! Playback synchronization
//!
//! The video element and the audio engine run on independent clocks. The
//! [`SyncController`] treats the video as the reference, projects where the
//! audio source should be from an anchor point, and corrects the difference:
//!
//! ```text
//! expected = anchor.position + (engine_now - anchor.clock) * applied_rate
//! target   = max(0, reference_now + offset_ms / 1000)
//! drift    = target - expected
//!
//! |drift| >  hard  → restart the source at target
//! |drift| >  soft  → nudge the rate by drift * gain, bounded to ±10%
//! otherwise        → relax back to the user rate
//! ```
//!
//! [`spawn`] runs a controller on a tokio task driven by host events and a
//! periodic tick.

mod controller;
mod driver;

pub use controller::{Anchor, Correction, PlaybackState, SyncController, SyncStats, TickReport};
pub use driver::{spawn, SyncHandle};

use crate::audio::MasterTrack;
use crate::error::Result;

/// The reference media clock (the video element)
pub trait ReferenceClock: Send {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Whether the reference's own audio is muted
    fn is_muted(&self) -> bool;

    /// Mute or unmute the reference's own audio
    fn set_muted(&mut self, muted: bool);
}

/// Host audio engine that plays the master track
pub trait AudioOutput: Send {
    /// Engine clock in seconds; monotonic while the session is open
    fn current_time(&self) -> f64;

    /// Start a source over `track` at `position_secs` with `rate`
    fn start_source(&mut self, track: &MasterTrack, position_secs: f64, rate: f64) -> Result<()>;

    /// Change the rate of the running source
    fn set_source_rate(&mut self, rate: f64) -> Result<()>;

    /// Stop the running source, if any
    fn stop_source(&mut self);

    /// Release the engine; no calls follow
    fn close(&mut self);
}

/// Owned audio engine handle. Closed exactly once, at the latest on drop.
pub struct AudioSession<A: AudioOutput> {
    output: A,
    source_active: bool,
    closed: bool,
}

impl<A: AudioOutput> AudioSession<A> {
    /// Take ownership of an audio engine
    pub fn new(output: A) -> Self {
        Self {
            output,
            source_active: false,
            closed: false,
        }
    }

    /// The wrapped engine
    pub fn output(&self) -> &A {
        &self.output
    }

    /// The wrapped engine, mutably
    pub fn output_mut(&mut self) -> &mut A {
        &mut self.output
    }

    /// Engine clock in seconds
    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }

    /// Whether a source is currently scheduled
    pub fn source_active(&self) -> bool {
        self.source_active
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replace the running source; the previous one is always stopped first
    pub fn start(&mut self, track: &MasterTrack, position_secs: f64, rate: f64) -> Result<()> {
        if self.closed {
            return Err(crate::Error::Host("audio session is closed".into()));
        }
        self.stop();
        self.output.start_source(track, position_secs, rate)?;
        self.source_active = true;
        Ok(())
    }

    /// Change the live rate of the running source
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        if self.source_active {
            self.output.set_source_rate(rate)?;
        }
        Ok(())
    }

    /// Stop the running source
    pub fn stop(&mut self) {
        if self.source_active {
            self.output.stop_source();
            self.source_active = false;
        }
    }

    /// Stop and release the engine
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.stop();
        self.output.close();
        self.closed = true;
        tracing::debug!("Audio session closed");
    }
}

impl<A: AudioOutput> Drop for AudioSession<A> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Host notifications delivered to a running controller
#[derive(Debug, Clone)]
pub enum ClockEvent {
    /// The reference started playing
    Play,
    /// The reference paused
    Pause,
    /// The reference reached its end
    Ended,
    /// The reference jumped to a new position
    Seeked,
    /// The reference's volume or muted flag changed
    VolumeChanged,
    /// The user changed the playback rate
    RateChanged(f64),
    /// The user changed the audio offset, in milliseconds
    OffsetChanged(f64),
    /// A freshly rendered master track replaces the current one
    TrackLoaded(MasterTrack),
}
