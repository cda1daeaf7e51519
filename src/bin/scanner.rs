//! Breakout Scanner
//!
//! Backfills and streams 1-minute klines for every configured symbol,
//! evaluates support/resistance breakouts on each update and hands snapshots
//! and alerts to the sink dispatcher. Serves health, metrics and session
//! status over HTTP.

use breakwatch::config::{self, ScannerConfig};
use breakwatch::core::{start_server, AppState, ScannerRuntime};
use breakwatch::logging;
use breakwatch::metrics::Metrics;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let env = config::get_environment();
    let config = ScannerConfig::from_env();
    info!("Starting Breakout Scanner");
    info!(
        environment = %env,
        interval = %config.interval,
        window = config.session.series.window,
        ema_length = config.session.series.ema_length,
        "Configuration loaded"
    );

    let metrics = Arc::new(Metrics::new()?);
    let port = config.port;
    let mut runtime = ScannerRuntime::from_config(config, Some(metrics.clone()));

    let symbols = runtime.resolve_symbols().await?;
    if symbols.is_empty() {
        warn!("No symbols to scan, exiting");
        return Ok(());
    }
    info!(count = symbols.len(), "Scanning symbols: {}", symbols.join(", "));

    let registry = runtime.start(symbols);
    let mut state = AppState::new(metrics).with_sessions(registry);
    if let Some(dispatch) = runtime.dispatch_handle() {
        state = state.with_dispatch(dispatch);
    }
    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(error = %e, "HTTP server stopped");
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = runtime.wait() => {
            info!("All sessions finished");
        }
    }

    if let Some(report) = runtime.shutdown().await {
        info!(
            closed = report.sessions.closed,
            failed = report.sessions.failed,
            delivered = report.dispatch.delivered,
            dropped = report.dispatch.dropped,
            "Breakout Scanner stopped"
        );
    }

    Ok(())
}
