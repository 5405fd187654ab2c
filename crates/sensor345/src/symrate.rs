//! Adaptive symbol-rate tracking
//!
//! Transmitters do not agree on the exact pulse width. The
//! [`SymbolRateTracker`] measures the length of each run of
//! constant level, in samples, and converts run lengths into a
//! count of symbols. A Manchester-coded stream never holds one
//! level for more than two symbols, so every run is worth one or
//! two symbols.
//!
//! Until a sync pattern is found, run lengths are divided by a
//! fixed *estimate* derived from the nominal pulse width. When
//! the sync pattern is recognized, the tracker averages the run
//! lengths of the preamble and uses that average for the rest of
//! the frame.

use arraydeque::{ArrayDeque, Wrapping};

use crate::protocol::SYNC_LEVELS;

/// Number of runs remembered by the tracker
///
/// One less than the number of levels in the sync pattern.
pub const SYMBOL_WINDOW: usize = SYNC_LEVELS as usize - 1;

// Never report more than this many symbols for one run
const MAX_SYMBOLS_PER_RUN: f32 = 2.0;

// Most recent runs which are excluded from the average
//
// The end of the sync pattern holds one level for two symbols.
const UNRELIABLE_RUNS: usize = 2;

/// Samples-per-symbol estimator
#[derive(Clone, Debug)]
pub struct SymbolRateTracker {
    // run lengths, in samples. the back is the current run.
    runs: ArrayDeque<u32, SYMBOL_WINDOW, Wrapping>,

    // nominal samples per symbol
    estimate: f32,

    // samples per symbol in use for the current frame
    average: f32,
}

impl SymbolRateTracker {
    /// New tracker with `estimate` samples per symbol
    pub fn new(estimate: f32) -> Self {
        let mut runs: ArrayDeque<u32, SYMBOL_WINDOW, Wrapping> = ArrayDeque::new();
        runs.push_back(0);
        Self {
            runs,
            estimate,
            average: estimate,
        }
    }

    /// Count one more sample of the current run
    #[inline]
    pub fn extend(&mut self) {
        if let Some(len) = self.runs.back_mut() {
            *len = len.saturating_add(1);
        }
    }

    /// Begin a new run
    ///
    /// The sample which changed the level belongs to the new run,
    /// so it starts with a length of one. The oldest run ages off
    /// when the window is full.
    #[inline]
    pub fn start_new_symbol(&mut self) {
        self.runs.push_back(1);
    }

    /// Number of symbols in the current run
    ///
    /// Rounds to the nearest whole symbol, with halves rounding
    /// up, and never reports more than two.
    pub fn current_symbol_count(&self) -> u32 {
        let len = self.runs.back().copied().unwrap_or(0) as f32;
        f32::min((len / self.average).round(), MAX_SYMBOLS_PER_RUN) as u32
    }

    /// Length of the current run, in symbols
    ///
    /// Unlike [`current_symbol_count()`](Self::current_symbol_count),
    /// this is neither rounded nor clamped.
    pub fn current_run_symbols(&self) -> f32 {
        self.current_run() as f32 / self.average
    }

    /// Lock the average to the remembered runs
    ///
    /// Called when the sync pattern is recognized. Averages every
    /// remembered run except the two most recent. If there are not
    /// enough runs to average, the current average is kept.
    pub fn lock_average(&mut self) {
        let usable = self.runs.len().saturating_sub(UNRELIABLE_RUNS);
        if usable == 0 {
            return;
        }

        let sum: u64 = self.runs.iter().take(usable).map(|&len| len as u64).sum();
        self.average = sum as f32 / usable as f32;
    }

    /// Revert to the nominal estimate
    pub fn reset_average(&mut self) {
        self.average = self.estimate;
    }

    /// Samples per symbol in use
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Nominal samples per symbol
    pub fn estimate(&self) -> f32 {
        self.estimate
    }

    /// Length of the current run, in samples
    pub fn current_run(&self) -> u32 {
        self.runs.back().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    fn run_of(trk: &mut SymbolRateTracker, len: u32) {
        trk.start_new_symbol();
        for _i in 1..len {
            trk.extend();
        }
    }

    #[test]
    fn test_symbol_count_rounding() {
        let mut trk = SymbolRateTracker::new(10.0);
        assert_eq!(0, trk.current_symbol_count());

        run_of(&mut trk, 10);
        assert_eq!(10, trk.current_run());
        assert_eq!(1, trk.current_symbol_count());

        run_of(&mut trk, 15);
        assert_eq!(2, trk.current_symbol_count());

        run_of(&mut trk, 25);
        assert_eq!(2, trk.current_symbol_count());
        assert_approx_eq!(2.5f32, trk.current_run_symbols());

        run_of(&mut trk, 4);
        assert_eq!(0, trk.current_symbol_count());

        run_of(&mut trk, 6);
        assert_eq!(1, trk.current_symbol_count());

        run_of(&mut trk, 14);
        assert_eq!(1, trk.current_symbol_count());
    }

    #[test]
    fn test_lock_and_reset() {
        let mut trk = SymbolRateTracker::new(8.0);

        // a full window of 11-sample runs, then a long pair
        for _i in 0..SYMBOL_WINDOW - UNRELIABLE_RUNS {
            run_of(&mut trk, 11);
        }
        run_of(&mut trk, 22);
        run_of(&mut trk, 11);

        assert_eq!(1, trk.current_symbol_count());
        trk.lock_average();
        assert_approx_eq!(11.0f32, trk.average());

        run_of(&mut trk, 22);
        assert_eq!(2, trk.current_symbol_count());
        run_of(&mut trk, 12);
        assert_eq!(1, trk.current_symbol_count());

        trk.reset_average();
        assert_approx_eq!(8.0f32, trk.average());
        assert_approx_eq!(8.0f32, trk.estimate());
    }

    #[test]
    fn test_lock_partial_window() {
        let mut trk = SymbolRateTracker::new(8.0);

        // only the initial run and one more: nothing to average
        run_of(&mut trk, 9);
        trk.lock_average();
        assert_approx_eq!(8.0f32, trk.average());

        // initial 3-sample run, 13, 13, then two excluded runs
        let mut trk = SymbolRateTracker::new(8.0);
        trk.extend();
        trk.extend();
        trk.extend();
        run_of(&mut trk, 13);
        run_of(&mut trk, 13);
        run_of(&mut trk, 100);
        run_of(&mut trk, 100);
        assert_eq!(5, trk.runs.len());
        trk.lock_average();
        assert_approx_eq!((3.0f32 + 13.0 + 13.0) / 3.0, trk.average());
    }

    #[test]
    fn test_window_wraps() {
        let mut trk = SymbolRateTracker::new(8.0);
        for _i in 0..SYMBOL_WINDOW * 3 {
            run_of(&mut trk, 5);
        }
        assert_eq!(SYMBOL_WINDOW, trk.runs.len());
        trk.lock_average();
        assert_approx_eq!(5.0f32, trk.average());
    }
}
