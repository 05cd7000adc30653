//! Recording messenger for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::deep_link::start_link;
use super::{DeliveryError, Messenger};

#[derive(Debug, Default)]
pub(crate) struct RecordingMessenger {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub failing: HashSet<i64>,
}

impl RecordingMessenger {
    pub fn failing_for(users: &[i64]) -> Self {
        Self {
            failing: users.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub async fn recipients(&self) -> Vec<i64> {
        self.sent.lock().await.iter().map(|(user, _)| *user).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, user_id: i64, html: &str) -> Result<(), DeliveryError> {
        if self.failing.contains(&user_id) {
            return Err(DeliveryError::Api("Forbidden: bot was blocked by the user".to_owned()));
        }
        self.sent.lock().await.push((user_id, html.to_owned()));
        Ok(())
    }

    fn build_deep_link(&self, payload: &str) -> String {
        start_link("test_bot", payload)
    }
}
