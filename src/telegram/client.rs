//! Telegram Bot API client used for replies and notifications.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use tracing::{debug, info};

use super::deep_link::start_link;
use super::{DeliveryError, Messenger, RateLimiter};

impl From<RequestError> for DeliveryError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(seconds) => Self::RetryAfter(seconds.duration()),
            RequestError::Network(e) => Self::Network(e.to_string()),
            other => Self::Api(other.to_string()),
        }
    }
}

/// Sends HTML messages through the Bot API, one at a time at a bounded rate.
pub struct TelegramMessenger {
    bot: Bot,
    username: String,
    rate_limiter: RateLimiter,
}

impl TelegramMessenger {
    /// Creates the client and looks up the bot's username for deep links.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or Telegram is unreachable.
    pub async fn connect(token: &str, send_interval: Duration) -> Result<Self, DeliveryError> {
        info!("Connecting to Telegram...");

        let bot = Bot::new(token);
        let me = bot.get_me().await?;
        let username = me.username().to_owned();

        info!("Connected to Telegram as @{}", username);

        Ok(Self {
            bot,
            username,
            rate_limiter: RateLimiter::new(send_interval),
        })
    }

    /// Handle for the update dispatcher.
    #[must_use]
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Options shared by every outgoing message: entity links must not expand
/// into previews.
pub(crate) fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(&self, user_id: i64, html: &str) -> Result<(), DeliveryError> {
        let waited = self.rate_limiter.wait_and_acquire().await;
        if !waited.is_zero() {
            debug!("Waited {:?} for rate limit", waited);
        }

        let result = self
            .bot
            .send_message(ChatId(user_id), html)
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_preview())
            .await;

        match result {
            Ok(_) => {
                debug!("Message delivered to {}", user_id);
                Ok(())
            }
            Err(e) => {
                let err = DeliveryError::from(e);
                if let DeliveryError::RetryAfter(retry_after) = &err {
                    self.rate_limiter.handle_retry_after(*retry_after).await;
                }
                Err(err)
            }
        }
    }

    fn build_deep_link(&self, payload: &str) -> String {
        start_link(&self.username, payload)
    }
}

impl std::fmt::Debug for TelegramMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramMessenger")
            .field("username", &self.username)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previews_disabled() {
        assert!(no_preview().is_disabled);
    }

    #[test]
    fn test_api_error_mapping() {
        let retry_after = teloxide::types::Seconds::from_seconds(3);
        let err = DeliveryError::from(RequestError::RetryAfter(retry_after));
        assert!(matches!(err, DeliveryError::RetryAfter(d) if d == Duration::from_secs(3)));
    }
}
