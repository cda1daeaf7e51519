//! Live feed interface plus a channel-backed feed for tests and replays

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::TransportError;

#[async_trait]
pub trait LiveFeed: Send + Sync {
    /// Open the subscription for one instrument
    async fn connect(&self, symbol: &str) -> Result<Box<dyn FeedConnection>, TransportError>;
}

#[async_trait]
pub trait FeedConnection: Send {
    /// Next text frame; `None` once the feed closed gracefully
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self);
}

/// Frame injected into a `MockFeed` subscription
#[derive(Debug, Clone)]
pub enum MockFrame {
    Text(String),
    Error(String),
    Close,
}

/// Feed whose subscriptions are driven by test code through channels
#[derive(Clone, Default)]
pub struct MockFeed {
    pending: Arc<Mutex<HashMap<String, mpsc::UnboundedReceiver<MockFrame>>>>,
    connects: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<String>>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription for `symbol` and return its frame sender.
    ///
    /// Symbols without a registered subscription fail to connect.
    pub async fn subscription(&self, symbol: &str) -> mpsc::UnboundedSender<MockFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().await.insert(symbol.to_string(), rx);
        tx
    }

    /// Symbols that connected, in connection order
    pub async fn connects(&self) -> Vec<String> {
        self.connects.lock().await.clone()
    }

    /// Symbols whose connection was closed by the session
    pub async fn closes(&self) -> Vec<String> {
        self.closes.lock().await.clone()
    }
}

#[async_trait]
impl LiveFeed for MockFeed {
    async fn connect(&self, symbol: &str) -> Result<Box<dyn FeedConnection>, TransportError> {
        let rx = self
            .pending
            .lock()
            .await
            .remove(symbol)
            .ok_or_else(|| TransportError::Connect {
                url: format!("mock://{}", symbol),
                reason: "no subscription registered".to_string(),
            })?;
        self.connects.lock().await.push(symbol.to_string());
        Ok(Box::new(MockConnection {
            symbol: symbol.to_string(),
            rx,
            closes: self.closes.clone(),
        }))
    }
}

struct MockConnection {
    symbol: String,
    rx: mpsc::UnboundedReceiver<MockFrame>,
    closes: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FeedConnection for MockConnection {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        match self.rx.recv().await? {
            MockFrame::Text(text) => Some(Ok(text)),
            MockFrame::Error(reason) => Some(Err(TransportError::Read(reason))),
            MockFrame::Close => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
        self.closes.lock().await.push(self.symbol.clone());
    }
}
