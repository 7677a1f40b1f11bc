//! Per-bin threshold firing state.
//!
//! The registry remembers, for every bin, the last fill level it was shown
//! and which thresholds currently count as fired. It lives in memory only
//! and is rebuilt from a fresh store snapshot whenever the coordinator
//! starts, so a process restart never replays old crossings.

use std::collections::{HashMap, HashSet};

use crate::types::BinId;

/// Composite key for fired-flag tracking: (bin_id, boundary bit pattern).
///
/// Boundaries are exact configured constants copied around unchanged, so
/// bit identity is the right equality for them.
type FiredKey = (BinId, u64);

#[derive(Debug, Default)]
pub struct ThresholdRegistry {
    last_levels: HashMap<BinId, f64>,
    fired: HashSet<FiredKey>,
}

impl ThresholdRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given threshold currently counts as fired for a bin.
    ///
    /// Unknown bins and thresholds report `false`.
    pub fn fired(&self, bin_id: BinId, boundary: f64) -> bool {
        self.fired.contains(&(bin_id, boundary.to_bits()))
    }

    /// Record a threshold as fired or reset. Repeating a value is a no-op.
    pub fn set_fired(&mut self, bin_id: BinId, boundary: f64, fired: bool) {
        let key = (bin_id, boundary.to_bits());
        if fired {
            self.fired.insert(key);
        } else {
            self.fired.remove(&key);
        }
    }

    /// The last level recorded for a bin, or `0.0` if it was never seen.
    ///
    /// The zero default is what makes a bin discovered mid-flight evaluate
    /// as if it had just filled up from empty.
    pub fn last_level(&self, bin_id: BinId) -> f64 {
        self.last_levels.get(&bin_id).copied().unwrap_or(0.0)
    }

    /// Record the level a bin was last evaluated at.
    pub fn set_last_level(&mut self, bin_id: BinId, level: f64) {
        self.last_levels.insert(bin_id, level);
    }

    /// Drop all state for a bin that was deleted from the store.
    pub fn forget(&mut self, bin_id: BinId) {
        self.last_levels.remove(&bin_id);
        self.fired.retain(|(id, _)| *id != bin_id);
    }

    /// Number of bins with a recorded level.
    pub fn tracked_bins(&self) -> usize {
        self.last_levels.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
