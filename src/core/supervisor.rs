//! Fan-out of one stream session per symbol
//!
//! The supervisor owns the per-symbol map. Each entry's series is written only
//! by its session; the map exposes read access for status and snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::core::dispatcher::DispatchHandle;
use crate::core::session::{SessionState, StreamSession};
use crate::metrics::Metrics;
use crate::models::{SeriesSnapshot, SymbolId};
use crate::series::RollingSeries;
use crate::services::live_feed::LiveFeed;
use crate::services::market_data::MarketDataProvider;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&SessionState> for SessionStatus {
    fn from(state: &SessionState) -> Self {
        Self {
            state: state.name().to_string(),
            reason: state.failure().map(|e| e.to_string()),
        }
    }
}

/// Aggregate lifecycle counts across all sessions
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct SupervisorStatus {
    pub running: usize,
    pub closed: usize,
    pub failed: usize,
    pub sessions: BTreeMap<SymbolId, SessionStatus>,
}

impl SupervisorStatus {
    pub fn total(&self) -> usize {
        self.running + self.closed + self.failed
    }

    pub fn all_terminal(&self) -> bool {
        self.running == 0
    }
}

struct SessionEntry {
    state: watch::Receiver<SessionState>,
    series: Arc<RollingSeries>,
}

/// Read-only view of the supervisor's per-symbol map
#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<HashMap<SymbolId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn status(&self) -> SupervisorStatus {
        let mut status = SupervisorStatus::default();
        for (symbol, entry) in self.entries.iter() {
            let state = entry.state.borrow().clone();
            match state {
                SessionState::Closed => status.closed += 1,
                SessionState::Failed(_) => status.failed += 1,
                _ => status.running += 1,
            }
            status.sessions.insert(symbol.clone(), SessionStatus::from(&state));
        }
        status
    }

    pub fn state(&self, symbol: &str) -> Option<SessionState> {
        self.entries.get(symbol).map(|e| e.state.borrow().clone())
    }

    /// Latest snapshot of a symbol's series, read under the series lock
    pub fn snapshot(&self, symbol: &str) -> Option<SeriesSnapshot> {
        self.entries.get(symbol)?.series.latest_snapshot()
    }

    pub fn symbols(&self) -> Vec<SymbolId> {
        let mut symbols: Vec<SymbolId> = self.entries.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct SessionSupervisor {
    provider: Arc<dyn MarketDataProvider>,
    feed: Arc<dyn LiveFeed>,
    dispatch: DispatchHandle,
    config: SessionConfig,
    metrics: Option<Arc<Metrics>>,
}

impl SessionSupervisor {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        feed: Arc<dyn LiveFeed>,
        dispatch: DispatchHandle,
        config: SessionConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            provider,
            feed,
            dispatch,
            config,
            metrics,
        }
    }

    /// Spawn one session per distinct symbol
    pub fn start(&self, symbols: Vec<SymbolId>) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut entries = HashMap::new();
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            if entries.contains_key(&symbol) {
                warn!(symbol = %symbol, "Duplicate symbol ignored");
                continue;
            }
            let (session, state) = StreamSession::new(
                symbol.clone(),
                &self.config,
                self.provider.clone(),
                self.feed.clone(),
                self.dispatch.clone(),
                self.metrics.clone(),
            );
            entries.insert(
                symbol.clone(),
                SessionEntry {
                    state,
                    series: session.series(),
                },
            );
            let shutdown = shutdown_rx.clone();
            tasks.spawn(async move { (symbol, session.run(shutdown).await) });
        }

        info!(sessions = entries.len(), "Supervisor started sessions");
        SupervisorHandle {
            registry: SessionRegistry {
                entries: Arc::new(entries),
            },
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

pub struct SupervisorHandle {
    registry: SessionRegistry,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<(SymbolId, SessionState)>,
}

impl SupervisorHandle {
    pub fn status(&self) -> SupervisorStatus {
        self.registry.status()
    }

    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    /// Wait until every session reached a terminal state
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            log_outcome(joined);
        }
    }

    /// Signal every session to stop and wait up to `grace` for them to finish.
    ///
    /// Sessions still running after the grace period are aborted and report
    /// `Failed(Aborted)`.
    pub async fn shutdown(mut self, grace: Duration) -> SupervisorStatus {
        info!(sessions = self.registry.len(), "Shutting down sessions");
        self.shutdown.send_replace(true);

        if tokio::time::timeout(grace, self.wait()).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                grace_ms = grace.as_millis() as u64,
                "Sessions did not stop within grace period, aborting"
            );
            self.tasks.abort_all();
            while let Some(joined) = self.tasks.join_next().await {
                log_outcome(joined);
            }
        }

        let status = self.registry.status();
        info!(
            closed = status.closed,
            failed = status.failed,
            "All sessions stopped"
        );
        status
    }
}

fn log_outcome(joined: Result<(SymbolId, SessionState), tokio::task::JoinError>) {
    match joined {
        Ok((symbol, state)) => info!(symbol = %symbol, state = %state, "Session finished"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Session task panicked"),
    }
}
