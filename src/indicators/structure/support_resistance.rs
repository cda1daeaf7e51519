//! Support and Resistance bands
//!
//! Support is the lowest low and resistance the highest high of the trailing
//! window. Every update advances the window, whether or not the candle has
//! closed.

use std::collections::VecDeque;

use super::window::MonotonicWindow;
use crate::models::{Bands, Candle};

/// Incremental support/resistance tracker
#[derive(Debug, Clone)]
pub struct RollingBands {
    window: usize,
    lows: MonotonicWindow,
    highs: MonotonicWindow,
    recent_highs: VecDeque<f64>,
    recent_lows: VecDeque<f64>,
}

impl RollingBands {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            lows: MonotonicWindow::min(window),
            highs: MonotonicWindow::max(window),
            recent_highs: VecDeque::with_capacity(window),
            recent_lows: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, high: f64, low: f64) {
        self.highs.push(high);
        self.lows.push(low);

        if self.recent_highs.len() == self.window {
            self.recent_highs.pop_front();
            self.recent_lows.pop_front();
        }
        self.recent_highs.push_back(high);
        self.recent_lows.push_back(low);
    }

    pub fn bands(&self) -> Bands {
        if !self.highs.is_full() {
            return Bands::Unavailable;
        }
        match (self.lows.value(), self.highs.value()) {
            (Some(support), Some(resistance)) => Bands::Available {
                support,
                resistance,
            },
            _ => Bands::Unavailable,
        }
    }

    /// Highs of the trailing window, oldest first
    pub fn highs(&self) -> Vec<f64> {
        self.recent_highs.iter().copied().collect()
    }

    /// Lows of the trailing window, oldest first
    pub fn lows(&self) -> Vec<f64> {
        self.recent_lows.iter().copied().collect()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Calculate support and resistance by rescanning the last `window` candles
pub fn calculate_support_resistance(candles: &[Candle], window: usize) -> Bands {
    if window == 0 || candles.len() < window {
        return Bands::Unavailable;
    }

    let recent = &candles[candles.len() - window..];
    let support = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = recent
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);

    Bands::Available {
        support,
        resistance,
    }
}

/// Calculate support/resistance with the default breakout window (20)
pub fn calculate_support_resistance_default(candles: &[Candle]) -> Bands {
    calculate_support_resistance(candles, 20)
}
