//! Liveness probe seam.
//!
//! A probe answers one question: is the prediction service responding right
//! now? Probe-level errors are reported upward and treated the same as a
//! `false` answer by the supervisor.

use async_trait::async_trait;

/// Liveness check port consumed by the supervisor.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self) -> anyhow::Result<bool>;
}

/// HTTP probe against the prediction service's health endpoint.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn is_alive(&self) -> anyhow::Result<bool> {
        let response = self.client.get(&self.url).send().await?;
        Ok(response.status().is_success())
    }
}
