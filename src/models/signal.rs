use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candle::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakoutDirection {
    Up,
    Down,
    None,
}

impl BreakoutDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakoutDirection::Up => "up",
            BreakoutDirection::Down => "down",
            BreakoutDirection::None => "none",
        }
    }

    pub fn is_breakout(&self) -> bool {
        !matches!(self, BreakoutDirection::None)
    }
}

/// Result of one breakout evaluation; dispatched, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutEvent {
    pub symbol: SymbolId,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub latest_close: f64,
    pub direction: BreakoutDirection,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,
}

impl BreakoutEvent {
    /// Human-readable line used by the alert sinks
    pub fn describe(&self) -> String {
        let fmt_level = |level: Option<f64>| match level {
            Some(v) => format!("{:.5}", v),
            None => "n/a".to_string(),
        };
        let headline = match self.direction {
            BreakoutDirection::Up => "breakout UP",
            BreakoutDirection::Down => "breakout DOWN",
            BreakoutDirection::None => "no breakout",
        };
        format!(
            "{} {} | close {:.5} | support {} | resistance {}",
            self.symbol,
            headline,
            self.latest_close,
            fmt_level(self.support),
            fmt_level(self.resistance),
        )
    }
}
