//! Market data provider interface: instrument catalog and backfill.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::Candle;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Tradable instruments to stream
    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError>;

    /// Recent historical candles for a symbol, oldest first
    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ProviderError>;
}

/// In-memory provider serving fixed backfill per symbol
#[derive(Debug, Default, Clone)]
pub struct StaticMarketDataProvider {
    candles: HashMap<String, Vec<Candle>>,
    failing: HashMap<String, String>,
}

impl StaticMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(symbol.to_string(), candles);
        self
    }

    /// Make backfill for `symbol` fail with a malformed-response error
    pub fn with_failure(mut self, symbol: &str, reason: &str) -> Self {
        self.failing.insert(symbol.to_string(), reason.to_string());
        self
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketDataProvider {
    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError> {
        let mut symbols: Vec<String> = self
            .candles
            .keys()
            .chain(self.failing.keys())
            .cloned()
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ProviderError> {
        if let Some(reason) = self.failing.get(symbol) {
            return Err(ProviderError::Malformed(reason.clone()));
        }
        let candles = self
            .candles
            .get(symbol)
            .ok_or_else(|| ProviderError::UnknownSymbol(symbol.to_string()))?;
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}
