//! Scanner runtime: wires providers, sinks, dispatcher and supervisor

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::core::dispatcher::{DispatchHandle, DispatchStats, SinkDispatcher};
use crate::core::supervisor::{SessionRegistry, SessionSupervisor, SupervisorHandle, SupervisorStatus};
use crate::error::ProviderError;
use crate::metrics::Metrics;
use crate::models::SymbolId;
use crate::services::binance::{BinanceFeed, BinanceRestClient};
use crate::services::live_feed::LiveFeed;
use crate::services::market_data::MarketDataProvider;
use crate::services::sinks::{
    AlertSink, JsonlSnapshotStore, LogAlertSink, SnapshotStore, WebhookAlertSink,
};

/// Outcome of a full shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub sessions: SupervisorStatus,
    pub dispatch: DispatchStats,
}

pub struct ScannerRuntime {
    config: ScannerConfig,
    provider: Arc<dyn MarketDataProvider>,
    feed: Arc<dyn LiveFeed>,
    store: Arc<dyn SnapshotStore>,
    alerts: Arc<dyn AlertSink>,
    metrics: Option<Arc<Metrics>>,
    running: Option<Running>,
}

struct Running {
    dispatcher: SinkDispatcher,
    supervisor: SupervisorHandle,
}

impl ScannerRuntime {
    /// Runtime backed by Binance and the configured sinks
    pub fn from_config(config: ScannerConfig, metrics: Option<Arc<Metrics>>) -> Self {
        let provider = BinanceRestClient::with_client(config.rest_url.clone(), reqwest::Client::new())
            .with_interval(config.interval.clone())
            .with_quote_asset(config.quote_asset.clone())
            .with_max_symbols(config.max_symbols);
        let feed = BinanceFeed::with_url(config.ws_url.clone(), config.interval.clone());
        let store = JsonlSnapshotStore::new(config.snapshot_dir.clone());
        let alerts: Arc<dyn AlertSink> = match &config.alert_webhook_url {
            Some(url) => {
                info!("Breakout alerts go to webhook");
                Arc::new(WebhookAlertSink::new(url.clone()))
            }
            None => {
                info!("No ALERT_WEBHOOK_URL set, breakout alerts are logged only");
                Arc::new(LogAlertSink)
            }
        };

        Self::new(
            config,
            Arc::new(provider),
            Arc::new(feed),
            Arc::new(store),
            alerts,
            metrics,
        )
    }

    pub fn new(
        config: ScannerConfig,
        provider: Arc<dyn MarketDataProvider>,
        feed: Arc<dyn LiveFeed>,
        store: Arc<dyn SnapshotStore>,
        alerts: Arc<dyn AlertSink>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            config,
            provider,
            feed,
            store,
            alerts,
            metrics,
            running: None,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Configured symbols, or the provider's catalog when none are configured
    pub async fn resolve_symbols(&self) -> Result<Vec<SymbolId>, ProviderError> {
        if let Some(symbols) = &self.config.symbols {
            info!(symbols = ?symbols, "Using configured symbols");
            return Ok(symbols.clone());
        }
        let symbols = self.provider.list_symbols().await?;
        info!(count = symbols.len(), "Resolved symbols from exchange catalog");
        Ok(symbols)
    }

    /// Start the dispatcher and one session per symbol
    pub fn start(&mut self, symbols: Vec<SymbolId>) -> SessionRegistry {
        if let Some(running) = &self.running {
            warn!("Runtime already started");
            return running.supervisor.registry();
        }

        let dispatcher = SinkDispatcher::start(
            &self.config.dispatcher,
            self.store.clone(),
            self.alerts.clone(),
            self.metrics.clone(),
        );
        let supervisor = SessionSupervisor::new(
            self.provider.clone(),
            self.feed.clone(),
            dispatcher.handle(),
            self.config.session.clone(),
            self.metrics.clone(),
        )
        .start(symbols);

        let registry = supervisor.registry();
        self.running = Some(Running {
            dispatcher,
            supervisor,
        });
        registry
    }

    pub fn registry(&self) -> Option<SessionRegistry> {
        self.running.as_ref().map(|r| r.supervisor.registry())
    }

    pub fn dispatch_handle(&self) -> Option<DispatchHandle> {
        self.running.as_ref().map(|r| r.dispatcher.handle())
    }

    /// Resolve once every session has reached a terminal state
    pub async fn wait(&mut self) {
        if let Some(running) = self.running.as_mut() {
            running.supervisor.wait().await;
        }
    }

    /// Stop sessions first, then drain the dispatcher. Each stage gets the
    /// configured grace period.
    pub async fn shutdown(mut self) -> Option<ShutdownReport> {
        let Running {
            dispatcher,
            supervisor,
        } = self.running.take()?;
        let grace = self.config.shutdown_grace;

        let sessions = supervisor.shutdown(grace).await;
        let dispatch = dispatcher.shutdown(grace).await;
        info!(
            delivered = dispatch.delivered,
            dropped = dispatch.dropped,
            timeouts = dispatch.timeouts,
            "Scanner stopped"
        );

        Some(ShutdownReport { sessions, dispatch })
    }
}
