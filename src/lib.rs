//! Breakwatch: concurrent per-symbol kline ingestion with streaming EMA and
//! support/resistance breakout detection.

pub mod config;
pub mod core;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod series;
pub mod services;
pub mod signals;
