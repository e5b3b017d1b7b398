//! Periodic snapshot publishing.
//!
//! Transports that serve metrics (an HTTP handler, a push client) often
//! want the latest snapshot without gathering on every request. The
//! publisher gathers on a fixed interval and publishes each snapshot on a
//! `watch` channel; readers always see the most recent one.
//!
//! ```text
//! tick ──► spawn_blocking(gatherer.gather()) ──► watch::Sender<Option<Arc<Gathered>>>
//!                                                     │
//!                                  subscribe() / latest() ◄┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tally_registry::{Gathered, Gatherer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Handle to a running snapshot publisher.
///
/// Dropping the handle also stops the background task.
pub struct SnapshotPublisher {
    latest: watch::Receiver<Option<Arc<Gathered>>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SnapshotPublisher {
    /// Start publishing on the current tokio runtime.
    ///
    /// The first snapshot is gathered immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(gatherer: Arc<dyn Gatherer>, interval: Duration) -> Self {
        let (latest_tx, latest) = watch::channel(None);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let interval = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(run(gatherer, interval, latest_tx, shutdown_rx));
        Self {
            latest,
            shutdown,
            task,
        }
    }

    /// A receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Gathered>>> {
        self.latest.clone()
    }

    /// The most recent snapshot, if one has been gathered yet.
    pub fn latest(&self) -> Option<Arc<Gathered>> {
        self.latest.borrow().clone()
    }

    /// Stop the publisher and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "snapshot publisher task failed");
        }
    }
}

async fn run(
    gatherer: Arc<dyn Gatherer>,
    interval: Duration,
    latest: watch::Sender<Option<Arc<Gathered>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        interval_ms = interval.as_millis() as u64,
        "snapshot publisher started"
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let gatherer = Arc::clone(&gatherer);
                match tokio::task::spawn_blocking(move || gatherer.gather()).await {
                    Ok(gathered) => {
                        if !gathered.is_complete() {
                            warn!(
                                errors = gathered.errors.len(),
                                families = gathered.families.len(),
                                "gather completed with errors"
                            );
                        }
                        debug!(families = gathered.families.len(), "snapshot published");
                        latest.send_replace(Some(Arc::new(gathered)));
                    }
                    Err(e) => warn!(error = %e, "gather task failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("snapshot publisher shutting down");
                break;
            }
        }
    }
}
