//! Shared data models spanning the pipeline stages.

pub mod candle;
pub mod indicators;
pub mod signal;

pub use candle::{Candle, SymbolId};
pub use indicators::{Bands, EmaIndicator, SeriesSnapshot};
pub use signal::{BreakoutDirection, BreakoutEvent};
