//! Ack/requeue decision for a single delivery.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::codec;
use crate::model::TimetableChangeData;

/// Receives decoded change events from the consumer.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    /// Processes one event.
    ///
    /// `Ok(true)` acknowledges the delivery, `Ok(false)` hands it back to the
    /// queue for redelivery.
    ///
    /// # Errors
    ///
    /// Any error is treated like `Ok(false)`.
    async fn handle(&self, change: TimetableChangeData) -> anyhow::Result<bool>;
}

/// What to do with a delivery once it has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue,
}

/// Decodes `body`, runs the handler once and decides the delivery's fate.
///
/// The handler is not called when the body cannot be decoded.
pub async fn dispose(body: &[u8], handler: &dyn ChangeHandler) -> Disposition {
    let change = match codec::decode(body) {
        Ok(change) => change,
        Err(e) => {
            warn!("Failed to decode queue message: {}", e);
            return Disposition::Requeue;
        }
    };

    let entity = change.entity.name.clone();
    match handler.handle(change).await {
        Ok(true) => {
            debug!("Change for '{}' handled", entity);
            Disposition::Ack
        }
        Ok(false) => {
            debug!("Handler declined change for '{}', requeueing", entity);
            Disposition::Requeue
        }
        Err(e) => {
            warn!("Handler failed for '{}': {:#}", entity, e);
            Disposition::Requeue
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::{Entity, EntityType};

    struct CountingHandler {
        calls: AtomicUsize,
        outcome: fn() -> anyhow::Result<bool>,
    }

    impl CountingHandler {
        fn new(outcome: fn() -> anyhow::Result<bool>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome,
            }
        }
    }

    #[async_trait]
    impl ChangeHandler for CountingHandler {
        async fn handle(&self, _change: TimetableChangeData) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn body() -> Vec<u8> {
        codec::encode(&TimetableChangeData {
            entity: Entity::new(EntityType::Professor, 9, "Петров П. П."),
            metadata_changes: None,
            lesson_changes: Some(Vec::new()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_change_is_acked() {
        let handler = CountingHandler::new(|| Ok(true));
        assert_eq!(dispose(&body(), &handler).await, Disposition::Ack);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_declined_change_is_requeued() {
        let handler = CountingHandler::new(|| Ok(false));
        assert_eq!(dispose(&body(), &handler).await, Disposition::Requeue);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_requeued() {
        let handler = CountingHandler::new(|| Err(anyhow::anyhow!("store unavailable")));
        assert_eq!(dispose(&body(), &handler).await, Disposition::Requeue);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_body_skips_handler() {
        let handler = CountingHandler::new(|| Ok(true));
        assert_eq!(dispose(b"{\"oops\": 1}", &handler).await, Disposition::Requeue);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
