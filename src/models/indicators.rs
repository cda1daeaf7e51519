use serde::{Deserialize, Serialize};

use super::candle::{Candle, SymbolId};

/// Rolling support/resistance over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Bands {
    Available { support: f64, resistance: f64 },
    /// Fewer candles than the window holds
    Unavailable,
}

impl Bands {
    pub fn support(&self) -> Option<f64> {
        match self {
            Bands::Available { support, .. } => Some(*support),
            Bands::Unavailable => None,
        }
    }

    pub fn resistance(&self) -> Option<f64> {
        match self {
            Bands::Available { resistance, .. } => Some(*resistance),
            Bands::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Bands::Available { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmaIndicator {
    pub value: f64,
    pub period: usize,
}

/// Immutable view of a series taken under its lock right after an append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub symbol: SymbolId,
    /// 1-based count of candles ever appended to the series, seed included
    pub sequence: u64,
    pub latest: Candle,
    pub ema: f64,
    /// Support/resistance over the `W` candles preceding `latest`
    pub bands: Bands,
    pub window_highs: Vec<f64>,
    pub window_lows: Vec<f64>,
    /// Candles retained by the series
    pub len: usize,
}

impl SeriesSnapshot {
    pub fn latest_close(&self) -> f64 {
        self.latest.close
    }
}
