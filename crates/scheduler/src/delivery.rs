//! Delivery adapter seam: how dispatched notifications leave the process.
//!
//! The scheduler only needs a pass/fail answer per job; everything about
//! transport (push tokens, platform SDKs) lives behind this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Why a delivery did not go through.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport itself failed (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The downstream accepted the request but refused the notification.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Outbound delivery port consumed by the scheduler.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Deliver one notification payload to one user.
    async fn deliver(
        &self,
        user_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}

/// Hands finished notifications to the push gateway over HTTP.
///
/// The gateway owns token lookup and the actual platform push; this adapter
/// only reports whether the hand-off was accepted.
pub struct WebhookDelivery {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookDelivery {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for WebhookDelivery {
    async fn deliver(
        &self,
        user_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "user_id": user_id,
                "payload": payload,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(format!(
                "push gateway returned {}",
                response.status()
            )))
        }
    }
}
