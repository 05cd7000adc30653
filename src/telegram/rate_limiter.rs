//! Pacing of outgoing Bot API messages.
//!
//! A notification fan-out may send hundreds of messages in a row; keeping a
//! minimum gap between them stays under Telegram's flood limits, and a
//! `RetryAfter` answer pushes every following send back.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Serializes sends and keeps them at least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,

    /// Earliest moment the next send may start. `None` before the first send.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Sleeps until the next send slot and claims it.
    ///
    /// Concurrent callers queue on the lock, so slots are handed out one at a
    /// time. Returns how long the caller slept.
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut slot = self.next_slot.lock().await;

        let delay = remaining(*slot);
        if !delay.is_zero() {
            debug!("Pacing: next message in {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        *slot = Some(Instant::now() + self.min_interval);
        delay
    }

    /// How long a send started now would have to wait.
    pub async fn time_until_allowed(&self) -> Duration {
        remaining(*self.next_slot.lock().await)
    }

    /// Holds back all sends for `retry_after`, unless they are already held
    /// back longer.
    pub async fn handle_retry_after(&self, retry_after: Duration) {
        warn!("Telegram asked to retry after {:?}", retry_after);

        let resume_at = Instant::now() + retry_after;
        let mut slot = self.next_slot.lock().await;
        if slot.is_none_or(|at| at < resume_at) {
            *slot = Some(resume_at);
        }
    }
}

fn remaining(slot: Option<Instant>) -> Duration {
    slot.map_or(Duration::ZERO, |at| at.saturating_duration_since(Instant::now()))
}
