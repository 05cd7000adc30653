//! Background worker that pulls change events and notifies subscribers.

mod runner;

use async_trait::async_trait;

use crate::model::TimetableChangeData;
use crate::queue::{ChangeQueue, QueueError};

pub use runner::{ChangeWorker, MAX_BACKOFF, WorkerMessage};

/// Where the worker pulls change events from.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Takes at most one event off the queue.
    async fn poll_one(&self) -> Result<Option<TimetableChangeData>, QueueError>;

    async fn connect(&self) -> Result<(), QueueError>;

    async fn close(&self);
}

#[async_trait]
impl ChangeSource for ChangeQueue {
    async fn poll_one(&self) -> Result<Option<TimetableChangeData>, QueueError> {
        Self::poll_one(self).await
    }

    async fn connect(&self) -> Result<(), QueueError> {
        Self::connect(self).await
    }

    async fn close(&self) {
        Self::close(self).await;
    }
}
