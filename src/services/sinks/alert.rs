//! Breakout alert delivery

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::models::BreakoutEvent;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, event: &BreakoutEvent) -> Result<(), SinkError>;
}

/// Posts `{"content": "..."}` to a chat-style webhook
pub struct WebhookAlertSink {
    url: String,
    client: reqwest::Client,
    max_retries: usize,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected(status.as_u16()))
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn alert(&self, event: &BreakoutEvent) -> Result<(), SinkError> {
        let body = json!({ "content": event.describe() });
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries);

        (|| async { self.post_once(&body).await })
            .retry(backoff)
            // 4xx other than rate limiting will not succeed on retry
            .when(|e| !matches!(e, SinkError::Rejected(s) if (400..500).contains(s) && *s != 429))
            .notify(|e, after| {
                warn!(symbol = %event.symbol, error = %e, retry_in_ms = after.as_millis() as u64, "Webhook alert failed, retrying");
            })
            .await
    }
}

/// Emits breakouts as log events; used when no webhook is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn alert(&self, event: &BreakoutEvent) -> Result<(), SinkError> {
        info!(
            symbol = %event.symbol,
            direction = event.direction.as_str(),
            close = event.latest_close,
            support = ?event.support,
            resistance = ?event.resistance,
            "{}",
            event.describe()
        );
        Ok(())
    }
}

/// Records alerts in memory
#[derive(Clone, Default)]
pub struct MemoryAlertSink {
    events: Arc<Mutex<Vec<BreakoutEvent>>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BreakoutEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn alert(&self, event: &BreakoutEvent) -> Result<(), SinkError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
