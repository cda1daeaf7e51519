//! Structure indicators: rolling support/resistance

pub mod support_resistance;
pub mod window;

pub use support_resistance::*;
pub use window::*;
