pub mod structure;
pub mod trend;

pub use structure::{calculate_support_resistance, MonotonicWindow, RollingBands};
pub use trend::{calculate_ema, IncrementalEma};
