//! `RabbitMQ` client for the timetable change queue.

use std::sync::Arc;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicGetOptions,
    BasicPublishOptions, BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, acker::Acker};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::codec::{self, CodecError};
use super::disposition::{ChangeHandler, Disposition, dispose};
use crate::model::TimetableChangeData;

/// Default queue name shared with the scraper.
pub const DEFAULT_QUEUE_NAME: &str = "timetable_changes";

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// Errors returned by [`ChangeQueue`].
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to decode message: {0}")]
    Decode(CodecError),

    #[error("Failed to serialize message: {0}")]
    Serialization(CodecError),

    #[error("Failed to publish message: {0}")]
    Publish(String),
}

/// Connection state guarded by the client's mutex.
#[derive(Default)]
struct Session {
    connection: Option<Connection>,
    channel: Option<Channel>,
    consumer_tag: Option<String>,
    consumer_task: Option<JoinHandle<()>>,
}

impl Session {
    fn channel(&self) -> Option<&Channel> {
        self.channel
            .as_ref()
            .filter(|channel| channel.status().connected())
    }

    /// Whether a registered consumer is still delivering. A consumer whose
    /// task has ended is forgotten so a new one can be registered.
    fn consumer_running(&mut self) -> bool {
        if self.consumer_tag.is_none() {
            return false;
        }
        if self
            .consumer_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return true;
        }
        self.consumer_tag = None;
        self.consumer_task = None;
        false
    }

    fn reset(&mut self) {
        if let Some(task) = self.consumer_task.take() {
            task.abort();
        }
        self.consumer_tag = None;
        self.channel = None;
        self.connection = None;
    }
}

/// Publishes and consumes change events on a single durable queue.
///
/// One connection and one channel are kept per client and reopened on demand
/// after a failure or [`ChangeQueue::close`].
pub struct ChangeQueue {
    uri: String,
    queue_name: String,
    session: Mutex<Session>,
}

impl ChangeQueue {
    /// Creates a client. No connection is made until it is needed.
    #[must_use]
    pub fn new(uri: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            queue_name: queue_name.into(),
            session: Mutex::new(Session::default()),
        }
    }

    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Opens the connection and channel and declares the queue.
    ///
    /// Does nothing when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Connection`] if any step fails; cached state is
    /// dropped so the next call starts over.
    pub async fn connect(&self) -> Result<(), QueueError> {
        let mut session = self.session.lock().await;
        self.ensure_connected(&mut session).await.map(|_| ())
    }

    async fn ensure_connected(&self, session: &mut Session) -> Result<Channel, QueueError> {
        if let Some(channel) = session.channel() {
            return Ok(channel.clone());
        }

        session.reset();
        match self.open().await {
            Ok((connection, channel)) => {
                session.connection = Some(connection);
                session.channel = Some(channel.clone());
                info!("Connected to RabbitMQ queue '{}'", self.queue_name);
                Ok(channel)
            }
            Err(e) => {
                error!("Failed to connect to RabbitMQ: {}", e);
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<(Connection, Channel), QueueError> {
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to connect: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to create channel: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to enable confirms: {e}")))?;

        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                QueueError::Connection(format!(
                    "Failed to declare queue {}: {e}",
                    self.queue_name
                ))
            })?;

        Ok((connection, channel))
    }

    /// Publishes each event as its own persistent message.
    ///
    /// Every publish waits for the broker confirm. An empty batch succeeds
    /// without connecting.
    ///
    /// # Errors
    ///
    /// Stops at the first event that fails to serialize or publish.
    pub async fn publish(&self, events: &[TimetableChangeData]) -> Result<(), QueueError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut session = self.session.lock().await;
        let channel = self.ensure_connected(&mut session).await?;

        for event in events {
            let payload = codec::encode(event).map_err(QueueError::Serialization)?;

            let confirmation = channel
                .basic_publish(
                    "",
                    &self.queue_name,
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default().with_delivery_mode(PERSISTENT),
                )
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))?
                .await
                .map_err(|e| QueueError::Publish(e.to_string()))?;

            if confirmation.is_nack() {
                return Err(QueueError::Publish(format!(
                    "broker rejected change for '{}'",
                    event.entity.name
                )));
            }

            debug!("Published change for '{}'", event.entity.name);
        }

        info!(
            "Published {} change(s) to '{}'",
            events.len(),
            self.queue_name
        );
        Ok(())
    }

    /// Registers a push consumer that feeds every delivery to `handler`.
    ///
    /// Returns once the consumer is registered; deliveries are processed on a
    /// background task until [`ChangeQueue::stop`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Connection`] if connecting or registering fails.
    pub async fn consume(&self, handler: Arc<dyn ChangeHandler>) -> Result<(), QueueError> {
        let mut session = self.session.lock().await;
        let channel = self.ensure_connected(&mut session).await?;

        if session.consumer_running() {
            warn!("Consumer already registered on '{}'", self.queue_name);
            return Ok(());
        }

        let tag = format!("{}-{}", self.queue_name, std::process::id());
        let mut consumer = channel
            .basic_consume(
                &self.queue_name,
                &tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to start consumer: {e}")))?;

        let queue_name = self.queue_name.clone();
        let task = tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let disposition = dispose(&delivery.data, handler.as_ref()).await;
                        settle(&delivery.acker, disposition).await;
                    }
                    Err(e) => {
                        error!("Consumer on '{}' failed: {}", queue_name, e);
                        break;
                    }
                }
            }
            debug!("Consumer on '{}' stopped", queue_name);
        });

        info!("Consuming from '{}' as '{}'", self.queue_name, tag);
        session.consumer_tag = Some(tag);
        session.consumer_task = Some(task);
        Ok(())
    }

    /// Fetches at most one message with manual acknowledgement.
    ///
    /// A decodable message is acked and returned. An undecodable one is
    /// requeued and `None` is returned, as is an empty queue. Broker errors
    /// after connecting are logged, drop the session and yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Connection`] if the client cannot connect.
    pub async fn poll_one(&self) -> Result<Option<TimetableChangeData>, QueueError> {
        let mut session = self.session.lock().await;
        let channel = self.ensure_connected(&mut session).await?;

        let message = match channel
            .basic_get(&self.queue_name, BasicGetOptions { no_ack: false })
            .await
        {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!("Failed to get message from '{}': {}", self.queue_name, e);
                session.reset();
                return Ok(None);
            }
        };
        drop(session);

        let delivery = message.delivery;
        match codec::decode(&delivery.data) {
            Ok(change) => {
                settle(&delivery.acker, Disposition::Ack).await;
                Ok(Some(change))
            }
            Err(e) => {
                warn!("{}", QueueError::Decode(e));
                settle(&delivery.acker, Disposition::Requeue).await;
                Ok(None)
            }
        }
    }

    /// Cancels the push consumer, if one is registered.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        Self::stop_consumer(&mut session).await;
    }

    async fn stop_consumer(session: &mut Session) {
        let Some(tag) = session.consumer_tag.take() else {
            return;
        };

        if let Some(channel) = session.channel()
            && let Err(e) = channel
                .basic_cancel(&tag, BasicCancelOptions::default())
                .await
        {
            warn!("Failed to cancel consumer '{}': {}", tag, e);
        }
        // The consumer stream ends on its own once cancelled; detach so an
        // in-flight delivery is still settled.
        session.consumer_task = None;
        debug!("Consumer '{}' cancelled", tag);
    }

    /// Stops consuming and closes the channel and connection.
    ///
    /// Safe to call when already closed; [`ChangeQueue::connect`] may be
    /// called again afterwards.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        Self::stop_consumer(&mut session).await;

        if let Some(channel) = session.channel.take()
            && channel.status().connected()
            && let Err(e) = channel.close(200, "Bye").await
        {
            debug!("Failed to close channel: {}", e);
        }
        if let Some(connection) = session.connection.take()
            && connection.status().connected()
            && let Err(e) = connection.close(200, "Bye").await
        {
            debug!("Failed to close connection: {}", e);
        }

        session.reset();
        info!("Disconnected from RabbitMQ");
    }
}

async fn settle(acker: &Acker, disposition: Disposition) {
    let result = match disposition {
        Disposition::Ack => acker.ack(BasicAckOptions::default()).await,
        Disposition::Requeue => {
            acker
                .reject(BasicRejectOptions { requeue: true })
                .await
        }
    };
    if let Err(e) = result {
        error!("Failed to settle delivery ({:?}): {}", disposition, e);
    }
}

impl std::fmt::Debug for ChangeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeQueue")
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}
