//! Error taxonomy for the ingestion pipeline
//!
//! Per-message problems (`DecodeError`, `SeriesError::OutOfOrder`) are recovered
//! by skipping the message. `ProviderError` and `TransportError` end a single
//! symbol's session and never touch its siblings.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("series for {symbol} is already seeded")]
    AlreadySeeded { symbol: String },

    #[error("series for {symbol} must be seeded before appending")]
    NotSeeded { symbol: String },

    #[error("candle for {symbol} at {open_time} is older than the latest candle at {latest}")]
    OutOfOrder {
        symbol: String,
        open_time: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("kline payload is missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("kline for {received} arrived on the {expected} stream")]
    SymbolMismatch { expected: String, received: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no market data for {0}")]
    UnknownSymbol(String),
}

impl From<DecodeError> for ProviderError {
    fn from(e: DecodeError) -> Self {
        ProviderError::Malformed(e.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("feed read failed: {0}")]
    Read(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("dispatch queue is full")]
    QueueFull,

    #[error("dispatch queue stayed full for {waited_ms}ms, item for {symbol} dropped")]
    QueueTimeout { symbol: String, waited_ms: u64 },

    #[error("dispatch queue is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected alert with status {0}")]
    Rejected(u16),
}

/// Terminal failure of one symbol's session
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("backfill failed: {0}")]
    Backfill(String),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("session aborted before reaching a terminal state")]
    Aborted,
}
