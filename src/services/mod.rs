//! External collaborators: market data, live feed and sinks

pub mod binance;
pub mod live_feed;
pub mod market_data;
pub mod sinks;

pub use live_feed::{FeedConnection, LiveFeed, MockFeed, MockFrame};
pub use market_data::{MarketDataProvider, StaticMarketDataProvider};
