//! Signal evaluation interfaces.

pub mod breakout;

pub use breakout::BreakoutDetector;
