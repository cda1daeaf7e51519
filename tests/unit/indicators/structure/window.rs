//! Unit tests for the monotonic sliding-window extremum

use breakwatch::indicators::structure::{Extremum, MonotonicWindow};
use proptest::prelude::*;

#[test]
fn test_window_not_full_until_length_samples() {
    let mut window = MonotonicWindow::max(3);
    assert_eq!(window.value(), None);
    window.push(1.0);
    window.push(2.0);
    assert!(!window.is_full());
    window.push(0.5);
    assert!(window.is_full());
    assert_eq!(window.value(), Some(2.0));
    assert_eq!(window.kind(), Extremum::Max);
}

#[test]
fn test_window_evicts_old_extremum() {
    let mut window = MonotonicWindow::min(3);
    for v in [1.0, 5.0, 6.0, 7.0] {
        window.push(v);
    }
    assert_eq!(window.value(), Some(5.0));
}

#[test]
fn test_window_keeps_equal_values() {
    let mut window = MonotonicWindow::max(2);
    window.push(3.0);
    window.push(3.0);
    window.push(1.0);
    assert_eq!(window.value(), Some(3.0));
    window.push(1.0);
    assert_eq!(window.value(), Some(1.0));
}

proptest! {
    #[test]
    fn prop_window_matches_rescan(
        values in prop::collection::vec(-1_000.0f64..1_000.0, 1..200),
        len in 1usize..30,
    ) {
        let mut min = MonotonicWindow::min(len);
        let mut max = MonotonicWindow::max(len);

        for (i, &v) in values.iter().enumerate() {
            min.push(v);
            max.push(v);

            let start = (i + 1).saturating_sub(len);
            let trailing = &values[start..=i];
            let naive_min = trailing.iter().copied().fold(f64::INFINITY, f64::min);
            let naive_max = trailing.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            prop_assert_eq!(min.value(), Some(naive_min));
            prop_assert_eq!(max.value(), Some(naive_max));
            prop_assert_eq!(min.is_full(), i + 1 >= len);
        }
    }
}
