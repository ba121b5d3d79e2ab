//! Best-effort alerting sink for human operators
//!
//! Delivery must never block or fail a poll cycle: sends are spawned onto
//! the runtime and a failed delivery is only logged. Every message is tagged
//! with the watcher label and host so operators running several instances
//! can tell them apart.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

/// Fire-and-forget operator notifier
pub struct Notifier {
    label: String,
    host: String,
    webhook_url: Option<String>,
    client: Client,
}

impl Notifier {
    /// Create a notifier; with no webhook URL, messages only reach the log
    pub fn new(label: &str, webhook_url: Option<String>) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("pid-{}", std::process::id()));

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            label: label.to_string(),
            host,
            webhook_url,
            client,
        }
    }

    /// Emit an operator warning
    pub fn warn(&self, message: &str) {
        warn!(watcher = %self.label, "{}", message);

        let Some(url) = self.webhook_url.clone() else {
            return;
        };

        let payload = serde_json::json!({
            "level": "warn",
            "text": format!("watcher: {}, host: {}: {}", self.label, self.host, message),
        });

        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Notifier webhook delivered");
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), "Notifier webhook rejected message");
                }
                Err(e) => {
                    warn!(error = %e, "Notifier webhook delivery failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_warn_without_webhook_does_not_panic() {
        let notifier = Notifier::new("ChallengeWatcher", None);
        notifier.warn("test message");
    }
}
