//! Binance REST client: exchange catalog and kline backfill

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::messages::{ExchangeInfo, RestKline};
use crate::config::DEFAULT_REST_URL;
use crate::error::ProviderError;
use crate::models::Candle;
use crate::services::market_data::MarketDataProvider;

pub struct BinanceRestClient {
    base_url: String,
    client: reqwest::Client,
    interval: String,
    quote_asset: String,
    max_symbols: Option<usize>,
}

impl BinanceRestClient {
    pub fn new() -> Self {
        Self::with_client(DEFAULT_REST_URL.to_string(), reqwest::Client::new())
    }

    pub fn with_client(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            interval: "1m".to_string(),
            quote_asset: "USDT".to_string(),
            max_symbols: None,
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Only list symbols ending with this quote asset; empty keeps all
    pub fn with_quote_asset(mut self, quote_asset: impl Into<String>) -> Self {
        self.quote_asset = quote_asset.into().to_uppercase();
        self
    }

    pub fn with_max_symbols(mut self, max_symbols: Option<usize>) -> Self {
        self.max_symbols = max_symbols;
        self
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        Ok(response)
    }
}

impl Default for BinanceRestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceRestClient {
    async fn list_symbols(&self) -> Result<Vec<String>, ProviderError> {
        info!("Fetching exchange catalog");
        let info: ExchangeInfo = self
            .get("/api/v3/exchangeInfo", &[])
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let mut symbols: Vec<String> = info
            .symbols
            .into_iter()
            .map(|s| s.symbol)
            .filter(|s| s.ends_with(&self.quote_asset))
            .collect();
        if let Some(max) = self.max_symbols {
            symbols.truncate(max);
        }

        info!(
            count = symbols.len(),
            quote_asset = %self.quote_asset,
            "Discovered {} symbols",
            symbols.len()
        );
        Ok(symbols)
    }

    async fn get_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, ProviderError> {
        let rows: Vec<RestKline> = self
            .get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", self.interval.clone()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let fetched_at = Utc::now();
        let candles = rows
            .into_iter()
            .map(|row| row.into_candle(symbol, fetched_at))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(symbol = %symbol, count = candles.len(), "Fetched backfill candles");
        Ok(candles)
    }
}
