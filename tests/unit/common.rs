//! Shared candle builders for unit tests

#![allow(dead_code)]

use breakwatch::config::SeriesConfig;
use breakwatch::models::Candle;
use breakwatch::series::RollingSeries;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const SYMBOL: &str = "BTCUSDT";

pub fn minute(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i)
}

/// One-minute candle opening mid-range
pub fn candle(i: i64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(SYMBOL, minute(i), (high + low) / 2.0, high, low, close, 1.0)
        .with_close_time(minute(i + 1) - Duration::milliseconds(1))
}

pub fn flat_candles(count: usize, high: f64, low: f64) -> Vec<Candle> {
    (0..count as i64)
        .map(|i| candle(i, high, low, (high + low) / 2.0))
        .collect()
}

pub fn seeded_series(seed: Vec<Candle>, config: SeriesConfig) -> RollingSeries {
    let series = RollingSeries::new(SYMBOL, config);
    series.seed(seed).expect("seed series");
    series
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
