//! Telegram side of the bot: the update loop, message delivery, deep links
//! and rate limiting.

mod client;
pub mod deep_link;
mod dispatcher;
#[cfg(test)]
pub(crate) mod fake;
mod rate_limiter;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use client::TelegramMessenger;
pub(crate) use client::no_preview;
pub use deep_link::{decode_payload, encode_payload};
pub use dispatcher::{register_commands, run_dispatcher};
pub use rate_limiter::RateLimiter;

/// A message could not be delivered to one recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("Rate limited by Telegram, retry after {0:?}")]
    RetryAfter(Duration),

    #[error("Network error: {0}")]
    Network(String),
}

/// Outbound messaging used by notifications.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends an HTML message to a user's private chat.
    async fn send_message(&self, user_id: i64, html: &str) -> Result<(), DeliveryError>;

    /// Deep link that opens the bot with `payload` as the start parameter.
    fn build_deep_link(&self, payload: &str) -> String;
}
