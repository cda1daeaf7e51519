//! Sliding-window extremum over a fixed number of trailing samples
//!
//! Each sample enters and leaves the deque at most once, so `push` is O(1)
//! amortized regardless of the window length.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct MonotonicWindow {
    kind: Extremum,
    window: usize,
    pushed: u64,
    // (sample index, value); values monotonic from front to back
    deque: VecDeque<(u64, f64)>,
}

impl MonotonicWindow {
    pub fn new(kind: Extremum, window: usize) -> Self {
        let window = window.max(1);
        Self {
            kind,
            window,
            pushed: 0,
            deque: VecDeque::with_capacity(window),
        }
    }

    pub fn min(window: usize) -> Self {
        Self::new(Extremum::Min, window)
    }

    pub fn max(window: usize) -> Self {
        Self::new(Extremum::Max, window)
    }

    pub fn push(&mut self, value: f64) {
        let index = self.pushed;
        self.pushed += 1;

        while let Some(&(_, back)) = self.deque.back() {
            let dominated = match self.kind {
                Extremum::Min => back >= value,
                Extremum::Max => back <= value,
            };
            if !dominated {
                break;
            }
            self.deque.pop_back();
        }
        self.deque.push_back((index, value));

        while let Some(&(front_index, _)) = self.deque.front() {
            if front_index + self.window as u64 > index {
                break;
            }
            self.deque.pop_front();
        }
    }

    /// Extremum of the trailing window, `None` before the first sample
    pub fn value(&self) -> Option<f64> {
        self.deque.front().map(|&(_, v)| v)
    }

    /// True once at least `window` samples have been pushed
    pub fn is_full(&self) -> bool {
        self.pushed >= self.window as u64
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn kind(&self) -> Extremum {
        self.kind
    }
}
