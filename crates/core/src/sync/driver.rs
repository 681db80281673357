//! Cooperative driver task for a [`SyncController`]
//!
//! One tokio task per playback session multiplexes host events, the periodic
//! correction tick and a shutdown signal. The tick only fires while the
//! controller is playing; ticks missed while the task was busy are skipped,
//! not replayed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{Error, Result};
use crate::sync::{AudioOutput, ClockEvent, ReferenceClock, SyncController, SyncStats};

/// Handle to a running sync session
pub struct SyncHandle {
    events: mpsc::UnboundedSender<ClockEvent>,
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<Mutex<SyncStats>>,
    task: JoinHandle<SyncStats>,
}

impl SyncHandle {
    /// Deliver a host event to the session
    pub fn send(&self, event: ClockEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| Error::Host("sync session has stopped".into()))
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    /// Whether the driver task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the session down and wait for the final counters
    pub async fn shutdown(self) -> Result<SyncStats> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| Error::Other(format!("sync task failed: {}", e)))
    }
}

/// Run `controller` on a new tokio task
pub fn spawn<C, A>(controller: SyncController<C, A>) -> SyncHandle
where
    C: ReferenceClock + 'static,
    A: AudioOutput + 'static,
{
    let (events, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stats = Arc::new(Mutex::new(controller.stats()));

    let task = tokio::spawn(run(controller, events_rx, shutdown_rx, Arc::clone(&stats)));
    tracing::debug!("Sync driver task spawned");

    SyncHandle {
        events,
        shutdown_tx,
        stats,
        task,
    }
}

async fn run<C, A>(
    mut controller: SyncController<C, A>,
    mut events_rx: mpsc::UnboundedReceiver<ClockEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    stats: Arc<Mutex<SyncStats>>,
) -> SyncStats
where
    C: ReferenceClock,
    A: AudioOutput,
{
    let period = Duration::from_millis(controller.config().tick_interval_ms);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Starting sync driver (tick interval: {:?})", period);

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::debug!("Sync driver received shutdown signal");
                    break;
                }
            }

            event = events_rx.recv() => {
                let Some(event) = event else {
                    tracing::debug!("Sync event channel closed");
                    break;
                };
                let starts_playing = matches!(event, ClockEvent::Play);
                if let Err(e) = controller.handle_event(event) {
                    tracing::error!("Sync event failed: {}", e);
                }
                if starts_playing {
                    ticker.reset();
                }
            }

            _ = ticker.tick(), if controller.is_playing() => {
                if let Err(e) = controller.tick() {
                    tracing::error!("Sync tick failed: {}", e);
                }
            }
        }

        *stats.lock() = controller.stats();
    }

    controller.teardown();
    let final_stats = controller.stats();
    *stats.lock() = final_stats.clone();
    final_stats
}
