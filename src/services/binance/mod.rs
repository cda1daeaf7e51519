//! Binance spot market data: REST catalog/backfill and kline websocket stream

pub mod feed;
pub mod messages;
pub mod rest;

pub use feed::BinanceFeed;
pub use messages::{decode_kline_message, KlineEvent, RestKline};
pub use rest::BinanceRestClient;
