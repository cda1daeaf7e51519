//! EMA (Exponential Moving Average) indicator

use crate::models::{Candle, EmaIndicator};

/// Streaming EMA updated one close at a time
///
/// The first close seeds the average directly, so the value is defined from
/// the very first observation.
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalEma {
    length: usize,
    alpha: f64,
    value: Option<f64>,
}

impl IncrementalEma {
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        Self {
            length,
            alpha: 2.0 / (length as f64 + 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        let next = match self.value {
            None => close,
            Some(prev) => close * self.alpha + prev * (1.0 - self.alpha),
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Smoothing factor `2 / (length + 1)`
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Calculate the warm-started EMA over a full candle slice
pub fn calculate_ema(candles: &[Candle], length: usize) -> Option<EmaIndicator> {
    if candles.is_empty() {
        return None;
    }

    let mut ema = IncrementalEma::new(length);
    let value = candles.iter().fold(0.0, |_, c| ema.update(c.close));

    Some(EmaIndicator {
        value,
        period: ema.length(),
    })
}
