//! Job state notifications.
//!
//! Every job publishes its progress and exactly one terminal
//! [`EncodeInfos`] through a [`ProgressNotifier`]. Publishing is best-effort:
//! [`publish_best_effort`] logs failures and never fails the job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use eb_core::config::Config;
use eb_core::{EncodeInfos, Error, Result};

/// HTTP timeout for publish requests.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn publish(&self, infos: &EncodeInfos) -> Result<()>;
}

/// Publishes to a Dapr pubsub topic through the sidecar.
pub struct DaprPublisher {
    client: Client,
    url: String,
}

impl DaprPublisher {
    pub fn new(endpoint: &str, pubsub: &str, topic: &str) -> Self {
        let client = Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build publisher HTTP client: {e}");
                Client::new()
            });
        let url = format!(
            "{}/v1.0/publish/{pubsub}/{topic}",
            endpoint.trim_end_matches('/')
        );
        Self { client, url }
    }
}

#[async_trait]
impl ProgressNotifier for DaprPublisher {
    async fn publish(&self, infos: &EncodeInfos) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(infos)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("publish failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Internal(format!(
            "publish returned {status}: {}",
            body.trim()
        )))
    }
}

/// Writes events to the log instead of publishing them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ProgressNotifier for LogNotifier {
    async fn publish(&self, infos: &EncodeInfos) -> Result<()> {
        match serde_json::to_string(infos) {
            Ok(json) if infos.is_terminal() => tracing::info!(event = %json, "Job event"),
            Ok(json) => tracing::debug!(event = %json, "Job event"),
            Err(e) => tracing::warn!(error = %e, "Unserializable job event"),
        }
        Ok(())
    }
}

/// Pick the notifier selected by configuration.
pub fn from_config(config: &Config) -> Arc<dyn ProgressNotifier> {
    let pubsub = &config.pubsub;
    if pubsub.enabled && !pubsub.component.is_empty() && !pubsub.topic.is_empty() {
        tracing::info!(
            pubsub = %pubsub.component,
            topic = %pubsub.topic,
            "Publishing job events to Dapr pubsub"
        );
        Arc::new(DaprPublisher::new(&config.dapr.endpoint, &pubsub.component, &pubsub.topic))
    } else {
        Arc::new(LogNotifier)
    }
}

/// Publish `infos`, logging instead of returning any failure.
pub async fn publish_best_effort(notifier: &dyn ProgressNotifier, infos: &EncodeInfos) {
    if let Err(e) = notifier.publish(infos).await {
        tracing::warn!(
            job_id = %infos.job_id,
            state = ?infos.state,
            error = %e,
            "Failed to publish job event"
        );
    }
}
