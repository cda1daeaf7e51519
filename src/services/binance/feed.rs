//! Binance kline stream over tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DEFAULT_WS_URL;
use crate::error::TransportError;
use crate::services::live_feed::{FeedConnection, LiveFeed};

pub struct BinanceFeed {
    base_url: String,
    interval: String,
}

impl BinanceFeed {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_WS_URL, "1m")
    }

    pub fn with_url(base_url: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            interval: interval.into(),
        }
    }

    /// Stream URL for one symbol, e.g. `.../ws/btcusdt@kline_1m`
    pub fn stream_url(&self, symbol: &str) -> Result<Url, TransportError> {
        let raw = format!(
            "{}/ws/{}@kline_{}",
            self.base_url,
            symbol.to_lowercase(),
            self.interval
        );
        Url::parse(&raw).map_err(|e| TransportError::Connect {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }
}

impl Default for BinanceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveFeed for BinanceFeed {
    async fn connect(&self, symbol: &str) -> Result<Box<dyn FeedConnection>, TransportError> {
        let url = self.stream_url(symbol)?;
        let (stream, response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        info!(symbol = %symbol, status = %response.status(), "Kline stream connected");
        Ok(Box::new(BinanceConnection {
            symbol: symbol.to_string(),
            stream,
        }))
    }
}

struct BinanceConnection {
    symbol: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for BinanceConnection {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(TransportError::Read(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(symbol = %self.symbol, "Skipping non-UTF-8 binary frame"),
                },
                Message::Ping(payload) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err(TransportError::Read(e.to_string())));
                    }
                }
                Message::Close(frame) => {
                    match frame {
                        Some(cf) => info!(symbol = %self.symbol, code = ?cf.code, reason = %cf.reason, "Kline stream closed by server"),
                        None => info!(symbol = %self.symbol, "Kline stream closed by server"),
                    }
                    return None;
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            warn!(symbol = %self.symbol, error = %e, "Failed to close kline stream cleanly");
        }
    }
}
