//! Change worker runner.
//!
//! Each round polls the queue once, hands an event to the notifier and then
//! waits for the poll interval. A failed poll drops the connection; the next
//! rounds reconnect with a doubling delay until the broker is back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::ChangeSource;
use crate::notify::Notifier;
use crate::queue::QueueError;

/// Longest pause between reconnection attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Messages that can be sent to the worker.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Stop the worker.
    Shutdown,
}

/// Polls for change events and delivers them.
pub struct ChangeWorker {
    source: Arc<dyn ChangeSource>,

    notifier: Arc<Notifier>,

    /// Pause between polls.
    poll_interval: Duration,
}

impl ChangeWorker {
    /// Creates a worker polling once per second.
    #[must_use]
    pub fn new(source: Arc<dyn ChangeSource>, notifier: Arc<Notifier>) -> Self {
        Self {
            source,
            notifier,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Sets the pause between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs until [`WorkerMessage::Shutdown`] arrives or the sender is dropped.
    pub async fn run(&self, mut rx: mpsc::Receiver<WorkerMessage>) {
        info!("Change worker started");

        let mut backoff = self.poll_interval;
        let mut reconnect = false;

        loop {
            let result = if reconnect {
                self.source.connect().await
            } else {
                self.tick().await
            };

            let delay = match result {
                Ok(()) => {
                    if reconnect {
                        info!("Reconnected to the change queue");
                        reconnect = false;
                    }
                    backoff = self.poll_interval;
                    self.poll_interval
                }
                Err(e) => {
                    if reconnect {
                        warn!("Reconnection failed: {}", e);
                    } else {
                        error!("Failed to poll the change queue: {}", e);
                        self.source.close().await;
                        reconnect = true;
                    }
                    let delay = backoff;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    debug!("Retrying in {:?}", delay);
                    delay
                }
            };

            tokio::select! {
                () = sleep(delay) => {}
                msg = rx.recv() => {
                    match msg {
                        Some(WorkerMessage::Shutdown) | None => {
                            info!("Change worker shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Single round: poll once and deliver what was received.
    ///
    /// Delivery problems are logged; only queue errors are returned.
    async fn tick(&self) -> Result<(), QueueError> {
        let Some(change) = self.source.poll_one().await? else {
            return Ok(());
        };

        match self.notifier.notify(&change).await {
            Ok(report) => debug!(
                "Change for '{}' delivered to {} of {} subscriber(s)",
                change.entity.name,
                report.sent.len(),
                report.attempted()
            ),
            Err(e) => warn!(
                "Failed to load subscribers for '{}': {}",
                change.entity.name, e
            ),
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChangeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWorker")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
