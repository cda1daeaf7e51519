//! Per-symbol streaming session
//!
//! `Created → Backfilling → Connecting → Streaming → {Closed, Failed}`.
//! A session never reconnects: a transport failure is terminal and is
//! reported to the supervisor through the session's state channel.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::core::dispatcher::{DispatchHandle, DispatchItem};
use crate::error::{DecodeError, DispatchError, SessionError};
use crate::metrics::Metrics;
use crate::models::SymbolId;
use crate::series::RollingSeries;
use crate::services::binance::decode_kline_message;
use crate::services::live_feed::LiveFeed;
use crate::services::market_data::MarketDataProvider;
use crate::signals::BreakoutDetector;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Created,
    Backfilling,
    Connecting,
    Streaming,
    Closed,
    Failed(SessionError),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Backfilling => "backfilling",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
            SessionState::Failed(_) => "failed",
        }
    }

    /// Failure reason, if the session failed
    pub fn failure(&self) -> Option<&SessionError> {
        match self {
            SessionState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Publishes state transitions; a session dropped before finishing reports
/// `Failed(Aborted)`.
pub(crate) struct StateReporter {
    symbol: SymbolId,
    tx: watch::Sender<SessionState>,
    metrics: Option<Arc<Metrics>>,
}

impl StateReporter {
    pub(crate) fn new(
        symbol: SymbolId,
        metrics: Option<Arc<Metrics>>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::Created);
        if let Some(m) = &metrics {
            m.record_session_state(&SessionState::Created);
        }
        (Self { symbol, tx, metrics }, rx)
    }

    fn transition(&self, next: SessionState) {
        if self.tx.borrow().is_terminal() {
            return;
        }
        debug!(symbol = %self.symbol, state = %next, "Session state changed");
        if let Some(m) = &self.metrics {
            m.record_session_state(&next);
        }
        self.tx.send_replace(next);
    }

    fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }
}

impl Drop for StateReporter {
    fn drop(&mut self) {
        if !self.tx.borrow().is_terminal() {
            warn!(symbol = %self.symbol, "Session dropped before reaching a terminal state");
            self.transition(SessionState::Failed(SessionError::Aborted));
        }
    }
}

enum Frame {
    Shutdown,
    Closed,
    Text(String),
    Failed(SessionError),
}

pub struct StreamSession {
    symbol: SymbolId,
    series: Arc<RollingSeries>,
    provider: Arc<dyn MarketDataProvider>,
    feed: Arc<dyn LiveFeed>,
    dispatch: DispatchHandle,
    backfill_limit: usize,
    reporter: StateReporter,
    metrics: Option<Arc<Metrics>>,
}

impl StreamSession {
    /// Build a session and the receiver that observes its state
    pub fn new(
        symbol: impl Into<SymbolId>,
        config: &SessionConfig,
        provider: Arc<dyn MarketDataProvider>,
        feed: Arc<dyn LiveFeed>,
        dispatch: DispatchHandle,
        metrics: Option<Arc<Metrics>>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let symbol = symbol.into();
        let (reporter, state) = StateReporter::new(symbol.clone(), metrics.clone());
        let session = Self {
            series: Arc::new(RollingSeries::new(symbol.clone(), config.series)),
            symbol,
            provider,
            feed,
            dispatch,
            backfill_limit: config.backfill_limit,
            reporter,
            metrics,
        };
        (session, state)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Shared read view of the series this session writes
    pub fn series(&self) -> Arc<RollingSeries> {
        self.series.clone()
    }

    /// Drive the session to a terminal state
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SessionState {
        let terminal = match self.stream(&mut shutdown).await {
            Ok(()) => SessionState::Closed,
            Err(e) => {
                error!(symbol = %self.symbol, error = %e, "Session failed");
                SessionState::Failed(e)
            }
        };
        self.reporter.transition(terminal);
        self.reporter.current()
    }

    async fn stream(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), SessionError> {
        if *shutdown.borrow() {
            return Ok(());
        }

        self.reporter.transition(SessionState::Backfilling);
        let backfill = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            result = self.provider.get_candles(&self.symbol, self.backfill_limit) => result,
        };
        let candles = backfill.map_err(|e| SessionError::Backfill(e.to_string()))?;
        let seeded = candles.len();
        self.series
            .seed(candles)
            .map_err(|e| SessionError::Backfill(e.to_string()))?;
        info!(symbol = %self.symbol, candles = seeded, "Series seeded from backfill");

        self.reporter.transition(SessionState::Connecting);
        let connected = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            result = self.feed.connect(&self.symbol) => result,
        };
        let mut connection = connected?;

        self.reporter.transition(SessionState::Streaming);
        info!(symbol = %self.symbol, "Streaming live klines");

        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.changed() => Frame::Shutdown,
                next = connection.next_text() => match next {
                    None => Frame::Closed,
                    Some(Ok(text)) => Frame::Text(text),
                    Some(Err(e)) => Frame::Failed(e.into()),
                },
            };

            match frame {
                Frame::Text(text) => self.handle_text(&text).await,
                Frame::Shutdown => {
                    info!(symbol = %self.symbol, "Shutdown requested, closing feed");
                    connection.close().await;
                    return Ok(());
                }
                Frame::Closed => {
                    info!(symbol = %self.symbol, "Feed closed");
                    return Ok(());
                }
                Frame::Failed(e) => {
                    connection.close().await;
                    return Err(e);
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) {
        let candle = match decode_kline_message(text) {
            Ok(Some(candle)) => candle,
            Ok(None) => {
                debug!(symbol = %self.symbol, "Ignoring non-kline message");
                return;
            }
            Err(e) => return self.reject(e, text),
        };
        if candle.symbol != self.symbol {
            return self.reject(
                DecodeError::SymbolMismatch {
                    expected: self.symbol.clone(),
                    received: candle.symbol,
                },
                text,
            );
        }

        let snapshot = match self.series.append(candle) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "Dropping candle rejected by series");
                if let Some(m) = &self.metrics {
                    m.dropped_candles_total.inc();
                }
                return;
            }
        };
        let event = BreakoutDetector::evaluate(&snapshot);

        if let Some(m) = &self.metrics {
            m.candles_ingested_total.inc();
            m.record_breakout(event.direction);
        }
        debug!(
            symbol = %self.symbol,
            support = ?event.support,
            resistance = ?event.resistance,
            close = event.latest_close,
            ema = snapshot.ema,
            direction = event.direction.as_str(),
            "Evaluated breakout"
        );
        if event.direction.is_breakout() {
            info!(symbol = %self.symbol, direction = event.direction.as_str(), close = event.latest_close, "Breakout detected");
        }

        match self.dispatch.enqueue(DispatchItem { snapshot, event }).await {
            Ok(()) => {}
            Err(e @ DispatchError::QueueTimeout { .. }) => {
                warn!(symbol = %self.symbol, error = %e, "Snapshot lost, dispatcher queue full");
            }
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "Snapshot not dispatched");
            }
        }
    }

    fn reject(&self, error: DecodeError, text: &str) {
        warn!(symbol = %self.symbol, error = %error, raw = %truncate(text, 256), "Dropping undecodable message");
        if let Some(m) = &self.metrics {
            m.decode_errors_total.inc();
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
