//! Lead sink: where captured leads are delivered.
//!
//! A single POST-style call taking the raw tool-call arguments as JSON. No
//! response contract beyond success/failure; delivery failures are logged by
//! the dispatcher and never affect the session.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

/// Errors delivering a lead.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The request could not be sent.
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Destination for captured leads.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Deliver one lead payload.
    async fn deliver(&self, payload: &Value) -> Result<(), SinkError>;
}

/// HTTP webhook [`LeadSink`].
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    /// Create a sink POSTing to the given URL.
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl LeadSink for WebhookSink {
    async fn deliver(&self, payload: &Value) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        Ok(())
    }
}

/// Sink used when no webhook is configured; leads only reach the UI mirror.
pub struct NullSink;

#[async_trait]
impl LeadSink for NullSink {
    async fn deliver(&self, _payload: &Value) -> Result<(), SinkError> {
        Ok(())
    }
}
