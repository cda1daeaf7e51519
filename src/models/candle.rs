use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exchange instrument identifier, e.g. `BTCUSDT`
pub type SymbolId = String;

/// One fixed-interval OHLCV observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: SymbolId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub num_trades: u64,
    pub is_closed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
    pub quote_volume: f64,
    pub taker_buy_base_volume: f64,
}

impl Candle {
    pub fn new(
        symbol: impl Into<SymbolId>,
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            open_time,
            open,
            high,
            low,
            close,
            volume,
            num_trades: 0,
            is_closed: false,
            close_time: open_time,
            quote_volume: 0.0,
            taker_buy_base_volume: 0.0,
        }
    }

    pub fn with_close_time(mut self, close_time: DateTime<Utc>) -> Self {
        self.close_time = close_time;
        self
    }

    pub fn with_num_trades(mut self, num_trades: u64) -> Self {
        self.num_trades = num_trades;
        self
    }

    pub fn with_closed(mut self, is_closed: bool) -> Self {
        self.is_closed = is_closed;
        self
    }

    pub fn with_quote_volume(mut self, quote_volume: f64) -> Self {
        self.quote_volume = quote_volume;
        self
    }

    pub fn with_taker_buy_base_volume(mut self, volume: f64) -> Self {
        self.taker_buy_base_volume = volume;
        self
    }
}
