//! Stats Aggregator
//!
//! Rolling counters over the feed. The per-tick counters are cleared by
//! [`StatsAggregator::snapshot`]; `milestone` and `index` are sticky.

use serde::{Deserialize, Serialize};

/// Stats window as broadcast to viewers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsWindow {
    /// Latest milestone index (sticky)
    pub milestone: u64,
    /// Total nodes appended, equal to the next sequence index (sticky)
    pub index: u64,
    /// Nodes appended this tick
    pub tpm: u64,
    /// Valued nodes appended this tick
    pub tvpm: u64,
    /// Value appended this tick
    pub ipm: f64,
    /// Confirmations this tick
    pub apm: u64,
    /// Valued confirmations this tick
    pub avpm: u64,
}

impl StatsWindow {
    /// Copy of this window with the per-tick counters zeroed
    pub fn sticky(&self) -> Self {
        Self {
            milestone: self.milestone,
            index: self.index,
            ..Self::default()
        }
    }
}

/// Owns the current stats window
#[derive(Debug, Default)]
pub struct StatsAggregator {
    window: StatsWindow,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing node count, e.g. a reopened store
    pub fn with_index(index: u64) -> Self {
        Self {
            window: StatsWindow {
                index,
                ..StatsWindow::default()
            },
        }
    }

    pub fn on_append(&mut self, value: f64) {
        self.window.tpm += 1;
        self.window.index += 1;
        if value > 0.0 {
            self.window.tvpm += 1;
            self.window.ipm += value;
        }
    }

    /// Counted as soon as the confirmation is seen
    pub fn on_confirm(&mut self) {
        self.window.apm += 1;
    }

    /// Counted once the confirmed node is known to carry value
    pub fn on_valued_confirm(&mut self) {
        self.window.avpm += 1;
    }

    /// Overwrites the milestone; regressions are accepted as-is
    pub fn on_milestone(&mut self, milestone: u64) {
        self.window.milestone = milestone;
    }

    /// Current window, left untouched
    pub fn current(&self) -> StatsWindow {
        self.window
    }

    /// Return the current window and reset the per-tick counters
    pub fn snapshot(&mut self) -> StatsWindow {
        let window = self.window;
        self.window = window.sticky();
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_counts() {
        let mut stats = StatsAggregator::new();
        stats.on_append(0.0);
        stats.on_append(5.0);
        stats.on_append(2.5);

        let window = stats.current();
        assert_eq!(window.tpm, 3);
        assert_eq!(window.tvpm, 2);
        assert_eq!(window.ipm, 7.5);
        assert_eq!(window.index, 3);
    }

    #[test]
    fn test_snapshot_resets_tick_counters_only() {
        let mut stats = StatsAggregator::with_index(10);
        stats.on_milestone(42);
        stats.on_append(1.0);
        stats.on_confirm();
        stats.on_valued_confirm();
        stats.on_confirm();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.apm, 2);
        assert_eq!(snapshot.avpm, 1);
        assert_eq!(snapshot.index, 11);

        let after = stats.current();
        assert_eq!(after.tpm, 0);
        assert_eq!(after.tvpm, 0);
        assert_eq!(after.ipm, 0.0);
        assert_eq!(after.apm, 0);
        assert_eq!(after.avpm, 0);
        assert_eq!(after.milestone, 42);
        assert_eq!(after.index, 11);
    }

    #[test]
    fn test_milestone_may_regress() {
        let mut stats = StatsAggregator::new();
        stats.on_milestone(100);
        stats.on_milestone(90);
        assert_eq!(stats.current().milestone, 90);
    }
}
