//! Unit tests for EMA indicator

use breakwatch::indicators::trend::{calculate_ema, IncrementalEma};

use crate::common::{approx_eq, candle};

#[test]
fn test_ema_first_value_is_first_close() {
    let mut ema = IncrementalEma::new(10);
    assert_eq!(ema.value(), None);
    assert_eq!(ema.update(42.5), 42.5);
    assert_eq!(ema.value(), Some(42.5));
}

#[test]
fn test_ema_second_value_weights_recent_close() {
    let mut ema = IncrementalEma::new(10);
    ema.update(100.0);
    let second = ema.update(110.0);
    let expected = 110.0 * (2.0 / 11.0) + 100.0 * (9.0 / 11.0);
    assert!(approx_eq(second, expected), "{} != {}", second, expected);
}

#[test]
fn test_ema_alpha() {
    let ema = IncrementalEma::new(10);
    assert!(approx_eq(ema.alpha(), 2.0 / 11.0));
    assert_eq!(ema.length(), 10);
}

#[test]
fn test_ema_zero_length_clamped() {
    let mut ema = IncrementalEma::new(0);
    assert_eq!(ema.length(), 1);
    ema.update(5.0);
    assert_eq!(ema.update(7.0), 7.0);
}

#[test]
fn test_calculate_ema_empty() {
    assert!(calculate_ema(&[], 10).is_none());
}

#[test]
fn test_calculate_ema_matches_incremental() {
    let candles: Vec<_> = (0..30)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
            candle(i, close + 1.0, close - 1.0, close)
        })
        .collect();

    let mut incremental = IncrementalEma::new(10);
    let mut last = 0.0;
    for c in &candles {
        last = incremental.update(c.close);
    }

    let batch = calculate_ema(&candles, 10).unwrap();
    assert_eq!(batch.period, 10);
    assert!(approx_eq(batch.value, last));
}
