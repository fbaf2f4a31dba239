//! Webhook [`RunNotifier`]: pings `{url}` when a run completes or is skipped
//! and `{url}/fail` when it is abandoned or fails. The body is the outcome as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use boost_core::error::BoostError;
use boost_core::traits::RunNotifier;
use boost_core::types::RunOutcome;

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BoostError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BoostError::Notifier(format!("build http client: {e}")))?;
        Ok(Self { client, url: url.into() })
    }

    pub fn target_url(&self, outcome: &RunOutcome) -> String {
        let base = self.url.trim_end_matches('/');
        if outcome.is_failure() {
            format!("{base}/fail")
        } else {
            base.to_string()
        }
    }
}

#[async_trait]
impl RunNotifier for WebhookNotifier {
    async fn notify(&self, outcome: &RunOutcome) -> Result<(), BoostError> {
        let url = self.target_url(outcome);
        let resp = self
            .client
            .post(&url)
            .json(outcome)
            .send()
            .await
            .map_err(|e| BoostError::Notifier(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BoostError::Notifier(format!("{url} returned {status}")));
        }
        debug!(network = %outcome.network(), %url, "run outcome delivered");
        Ok(())
    }
}
