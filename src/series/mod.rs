//! Per-symbol rolling candle history with incremental indicators
//!
//! A `RollingSeries` owns its lock. Every mutation and every snapshot read
//! happens under it, and the critical section never awaits or performs I/O.
//!
//! A snapshot's bands cover the `W` candles before its latest candle, so the
//! latest close is always judged against a range it did not contribute to.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::config::SeriesConfig;
use crate::error::SeriesError;
use crate::indicators::{IncrementalEma, RollingBands};
use crate::models::{Candle, SeriesSnapshot, SymbolId};

#[derive(Debug)]
struct SeriesState {
    seeded: bool,
    candles: VecDeque<Candle>,
    sequence: u64,
    ema: IncrementalEma,
    bands: RollingBands,
    latest: Option<SeriesSnapshot>,
}

#[derive(Debug)]
pub struct RollingSeries {
    symbol: SymbolId,
    config: SeriesConfig,
    state: Mutex<SeriesState>,
}

impl RollingSeries {
    pub fn new(symbol: impl Into<SymbolId>, config: SeriesConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            state: Mutex::new(SeriesState {
                seeded: false,
                candles: VecDeque::new(),
                sequence: 0,
                ema: IncrementalEma::new(config.ema_length),
                bands: RollingBands::new(config.window),
                latest: None,
            }),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> SeriesConfig {
        self.config
    }

    /// Initialize the history from backfill; must precede any `append`
    pub fn seed(&self, candles: impl IntoIterator<Item = Candle>) -> Result<(), SeriesError> {
        let mut state = self.lock();
        if state.seeded {
            return Err(SeriesError::AlreadySeeded {
                symbol: self.symbol.clone(),
            });
        }

        let candles: Vec<Candle> = candles.into_iter().collect();
        if let Some(pair) = candles.windows(2).find(|w| w[1].open_time < w[0].open_time) {
            return Err(SeriesError::OutOfOrder {
                symbol: self.symbol.clone(),
                open_time: pair[1].open_time,
                latest: pair[0].open_time,
            });
        }

        for candle in candles {
            self.push_locked(&mut state, candle);
        }
        state.seeded = true;
        Ok(())
    }

    /// Append one candle and return the snapshot taken under the same lock
    pub fn append(&self, candle: Candle) -> Result<SeriesSnapshot, SeriesError> {
        let mut state = self.lock();
        if !state.seeded {
            return Err(SeriesError::NotSeeded {
                symbol: self.symbol.clone(),
            });
        }
        if let Some(last) = state.candles.back() {
            if candle.open_time < last.open_time {
                return Err(SeriesError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    open_time: candle.open_time,
                    latest: last.open_time,
                });
            }
        }

        Ok(self.push_locked(&mut state, candle))
    }

    pub fn latest_snapshot(&self) -> Option<SeriesSnapshot> {
        self.lock().latest.clone()
    }

    pub fn is_seeded(&self) -> bool {
        self.lock().seeded
    }

    pub fn len(&self) -> usize {
        self.lock().candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retained candles, oldest first
    pub fn history(&self) -> Vec<Candle> {
        self.lock().candles.iter().cloned().collect()
    }

    fn push_locked(&self, state: &mut SeriesState, candle: Candle) -> SeriesSnapshot {
        let ema = state.ema.update(candle.close);
        let bands = state.bands.bands();
        let window_highs = state.bands.highs();
        let window_lows = state.bands.lows();
        state.bands.push(candle.high, candle.low);
        state.sequence += 1;

        let latest = candle.clone();
        state.candles.push_back(candle);
        if let Some(capacity) = self.config.capacity {
            let keep = capacity.max(self.config.window);
            while state.candles.len() > keep {
                state.candles.pop_front();
            }
        }

        let snapshot = SeriesSnapshot {
            symbol: self.symbol.clone(),
            sequence: state.sequence,
            latest,
            ema,
            bands,
            window_highs,
            window_lows,
            len: state.candles.len(),
        };
        state.latest = Some(snapshot.clone());
        snapshot
    }

    fn lock(&self) -> MutexGuard<'_, SeriesState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
