//! Support/resistance breakout decision rule

use crate::models::indicators::{Bands, SeriesSnapshot};
use crate::models::signal::{BreakoutDirection, BreakoutEvent};

pub struct BreakoutDetector;

impl BreakoutDetector {
    /// Evaluate the latest close against the current bands.
    ///
    /// Strict inequalities only: a close equal to a band is not a breakout.
    /// `Up` is checked before `Down`, so at most one direction fires even if
    /// the bands are inverted.
    pub fn evaluate(snapshot: &SeriesSnapshot) -> BreakoutEvent {
        let close = snapshot.latest_close();
        let direction = match snapshot.bands {
            Bands::Unavailable => BreakoutDirection::None,
            Bands::Available { resistance, .. } if close > resistance => BreakoutDirection::Up,
            Bands::Available { support, .. } if close < support => BreakoutDirection::Down,
            Bands::Available { .. } => BreakoutDirection::None,
        };

        BreakoutEvent {
            symbol: snapshot.symbol.clone(),
            support: snapshot.bands.support(),
            resistance: snapshot.bands.resistance(),
            latest_close: close,
            direction,
            open_time: snapshot.latest.open_time,
        }
    }
}
