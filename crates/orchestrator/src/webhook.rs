use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

/// Fire-and-forget webhook delivery: up to `attempts` tries with linear
/// backoff, then the notification is abandoned.
#[derive(Clone)]
pub struct WebhookDispatcher {
	client: reqwest::Client,
	attempts: u32,
	backoff_base: Duration,
}

impl Default for WebhookDispatcher {
	fn default() -> Self {
		Self::new(3, Duration::from_secs(2))
	}
}

impl WebhookDispatcher {
	#[must_use]
	pub fn new(attempts: u32, backoff_base: Duration) -> Self {
		Self {
			client: reqwest::Client::new(),
			attempts: attempts.max(1),
			backoff_base,
		}
	}

	/// Deliver asynchronously; the caller never waits on the receiver.
	pub fn dispatch(&self, url: String, payload: Value) {
		let dispatcher = self.clone();
		tokio::spawn(async move {
			dispatcher.deliver(&url, &payload).await;
		});
	}

	async fn deliver(&self, url: &str, payload: &Value) {
		for attempt in 1..=self.attempts {
			match self.client.post(url).json(payload).send().await {
				Ok(response) if response.status().is_success() => {
					debug!(url, attempt, "webhook delivered");
					return;
				}
				Ok(response) => {
					warn!(url, attempt, status = %response.status(), "webhook rejected");
				}
				Err(e) => {
					warn!(url, attempt, error = %e, "webhook request failed");
				}
			}
			if attempt < self.attempts {
				tokio::time::sleep(self.backoff_base * attempt).await;
			}
		}
		warn!(url, attempts = self.attempts, "webhook abandoned after retries");
	}
}
