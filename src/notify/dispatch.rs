//! Fan-out of a rendered change to the entity's subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::model::TimetableChangeData;
use crate::queue::ChangeHandler;
use crate::store::{EntityStore, StoreError};
use crate::telegram::Messenger;

use super::render::render;

/// Who received a notification and who did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: Vec<i64>,
    pub failed: Vec<i64>,
}

impl DeliveryReport {
    /// Total number of subscribers a send was attempted for.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Sends change notifications to subscribers.
pub struct Notifier {
    store: Arc<dyn EntityStore>,
    messenger: Arc<dyn Messenger>,
}

impl Notifier {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self { store, messenger }
    }

    /// Renders `change` once and sends it to every subscriber of its entity.
    ///
    /// A failed send is logged and does not stop delivery to the others.
    /// Events without lesson changes are skipped before the store is queried.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber list cannot be read.
    pub async fn notify(&self, change: &TimetableChangeData) -> Result<DeliveryReport, StoreError> {
        let mut report = DeliveryReport::default();
        let entity = &change.entity.name;

        if change.lesson_changes().is_empty() {
            debug!("No lesson changes for '{}', nothing to send", entity);
            return Ok(report);
        }

        let subscribers = self.store.get_subscribed_users(entity).await?;
        if subscribers.is_empty() {
            debug!("No subscribers for '{}'", entity);
            return Ok(report);
        }

        let messenger = &self.messenger;
        let links = |name: &str| messenger.build_deep_link(name);
        let Some(text) = render(change, &links) else {
            return Ok(report);
        };

        for user_id in subscribers {
            match self.messenger.send_message(user_id, &text).await {
                Ok(()) => report.sent.push(user_id),
                Err(e) => {
                    warn!("Failed to notify {} about '{}': {}", user_id, entity, e);
                    report.failed.push(user_id);
                }
            }
        }

        info!(
            "Notified {}/{} subscriber(s) of '{}'",
            report.sent.len(),
            report.attempted(),
            entity
        );
        Ok(report)
    }
}

#[async_trait]
impl ChangeHandler for Notifier {
    async fn handle(&self, change: TimetableChangeData) -> anyhow::Result<bool> {
        self.notify(&change).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
