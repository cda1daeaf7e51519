//! Environment-driven configuration
//!
//! Every knob has a default so the scanner runs with an empty environment.
//! Values that fail to parse fall back to the default with a warning.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443";

/// Deployment environment name (`production`, `sandbox`, ...)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// Parameters of a single symbol's rolling series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesConfig {
    /// Trailing window `W` for support/resistance
    pub window: usize,
    pub ema_length: usize,
    /// `None` keeps every candle
    pub capacity: Option<usize>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            window: 20,
            ema_length: 10,
            capacity: Some(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub series: SeriesConfig,
    pub backfill_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            series: SeriesConfig::default(),
            backfill_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub capacity: usize,
    pub workers: usize,
    /// Longest a producer waits for queue space before giving up on an item
    pub enqueue_timeout: Duration,
    /// Consecutive full-queue events before the dispatcher reports degraded mode
    pub degraded_threshold: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            workers: 4,
            enqueue_timeout: Duration::from_millis(250),
            degraded_threshold: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    pub rest_url: String,
    pub ws_url: String,
    pub symbols: Option<Vec<String>>,
    pub quote_asset: String,
    pub max_symbols: Option<usize>,
    pub interval: String,
    pub session: SessionConfig,
    pub dispatcher: DispatcherConfig,
    pub shutdown_grace: Duration,
    pub snapshot_dir: String,
    pub alert_webhook_url: Option<String>,
    pub port: u16,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            symbols: None,
            quote_asset: "USDT".to_string(),
            max_symbols: None,
            interval: "1m".to_string(),
            session: SessionConfig::default(),
            dispatcher: DispatcherConfig::default(),
            shutdown_grace: Duration::from_millis(5000),
            snapshot_dir: "binance_data".to_string(),
            alert_webhook_url: None,
            port: 8080,
        }
    }
}

impl ScannerConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let capacity = match parse_var::<usize>("SERIES_CAPACITY") {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.session.series.capacity,
        };

        Self {
            rest_url: string_var("BINANCE_REST_URL").unwrap_or(defaults.rest_url),
            ws_url: string_var("BINANCE_WS_URL").unwrap_or(defaults.ws_url),
            symbols: string_var("SYMBOLS").and_then(|s| parse_symbol_list(&s)),
            quote_asset: string_var("QUOTE_ASSET").unwrap_or(defaults.quote_asset),
            max_symbols: parse_var("MAX_SYMBOLS"),
            interval: string_var("KLINE_INTERVAL").unwrap_or(defaults.interval),
            session: SessionConfig {
                series: SeriesConfig {
                    window: parse_var("BREAKOUT_WINDOW")
                        .filter(|w: &usize| *w > 0)
                        .unwrap_or(defaults.session.series.window),
                    ema_length: parse_var("EMA_LENGTH")
                        .filter(|l: &usize| *l > 0)
                        .unwrap_or(defaults.session.series.ema_length),
                    capacity,
                },
                backfill_limit: parse_var("BACKFILL_LIMIT")
                    .unwrap_or(defaults.session.backfill_limit),
            },
            dispatcher: DispatcherConfig {
                capacity: parse_var("DISPATCH_QUEUE_CAPACITY")
                    .filter(|c: &usize| *c > 0)
                    .unwrap_or(defaults.dispatcher.capacity),
                workers: parse_var("DISPATCH_WORKERS")
                    .filter(|w: &usize| *w > 0)
                    .unwrap_or(defaults.dispatcher.workers),
                enqueue_timeout: parse_var("DISPATCH_ENQUEUE_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.dispatcher.enqueue_timeout),
                degraded_threshold: parse_var("DISPATCH_DEGRADED_THRESHOLD")
                    .unwrap_or(defaults.dispatcher.degraded_threshold),
            },
            shutdown_grace: parse_var("SHUTDOWN_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
            snapshot_dir: string_var("SNAPSHOT_DIR").unwrap_or(defaults.snapshot_dir),
            alert_webhook_url: string_var("ALERT_WEBHOOK_URL"),
            port: parse_var("PORT").unwrap_or(defaults.port),
        }
    }
}

/// Split a comma-separated symbol list, upper-casing and dropping blanks
pub fn parse_symbol_list(raw: &str) -> Option<Vec<String>> {
    let symbols: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        None
    } else {
        Some(symbols)
    }
}

fn string_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = string_var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
