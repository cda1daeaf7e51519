//! Binance kline wire formats (REST rows and stream events)

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::models::Candle;

/// `<symbol>@kline_<interval>` stream event
#[derive(Debug, Clone, Deserialize)]
pub struct KlineEvent {
    #[serde(rename = "e", default)]
    pub event_type: String,
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "n")]
    pub num_trades: u64,
    #[serde(rename = "x")]
    pub is_closed: bool,
    #[serde(rename = "q")]
    pub quote_volume: String,
    #[serde(rename = "V")]
    pub taker_buy_base_volume: String,
}

impl KlineEvent {
    pub fn into_candle(self) -> Result<Candle, DecodeError> {
        let k = self.kline;
        Ok(Candle::new(
            self.symbol,
            millis_to_utc(k.open_time)?,
            parse_decimal("o", &k.open)?,
            parse_decimal("h", &k.high)?,
            parse_decimal("l", &k.low)?,
            parse_decimal("c", &k.close)?,
            parse_decimal("v", &k.volume)?,
        )
        .with_close_time(millis_to_utc(k.close_time)?)
        .with_num_trades(k.num_trades)
        .with_closed(k.is_closed)
        .with_quote_volume(parse_decimal("q", &k.quote_volume)?)
        .with_taker_buy_base_volume(parse_decimal("V", &k.taker_buy_base_volume)?))
    }
}

/// Decode one stream text frame.
///
/// `Ok(None)` means the frame carries no kline payload and should be ignored.
pub fn decode_kline_message(text: &str) -> Result<Option<Candle>, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    if value.get("k").is_none() {
        return Ok(None);
    }
    if value.get("s").is_none() {
        return Err(DecodeError::MissingField("s"));
    }
    let event: KlineEvent =
        serde_json::from_value(value).map_err(|e| DecodeError::Json(e.to_string()))?;
    event.into_candle().map(Some)
}

/// One row of `GET /api/v3/klines`
#[derive(Debug, Clone, Deserialize)]
pub struct RestKline(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub u64,
    pub String,
    pub String,
    #[serde(default)] pub Value,
);

impl RestKline {
    /// Rows whose close time precedes `fetched_at` are marked closed
    pub fn into_candle(self, symbol: &str, fetched_at: DateTime<Utc>) -> Result<Candle, DecodeError> {
        let close_time = millis_to_utc(self.6)?;
        Ok(Candle::new(
            symbol,
            millis_to_utc(self.0)?,
            parse_decimal("open", &self.1)?,
            parse_decimal("high", &self.2)?,
            parse_decimal("low", &self.3)?,
            parse_decimal("close", &self.4)?,
            parse_decimal("volume", &self.5)?,
        )
        .with_close_time(close_time)
        .with_closed(close_time < fetched_at)
        .with_quote_volume(parse_decimal("quote_volume", &self.7)?)
        .with_num_trades(self.8)
        .with_taker_buy_base_volume(parse_decimal("taker_buy_base_volume", &self.9)?))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: Option<String>,
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, DecodeError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp_millis(ms).ok_or(DecodeError::InvalidTimestamp(ms))
}
