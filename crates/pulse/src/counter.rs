//! Counter cell: two 64-bit signed accumulators indexed by epoch.

use crate::epoch::Epoch;
use crate::invariants::debug_assert_epoch;
use std::sync::atomic::{AtomicI64, Ordering};

pub(crate) struct CounterCell {
    slots: [AtomicI64; 2],
}

impl CounterCell {
    pub(crate) fn new() -> Self {
        Self {
            slots: [AtomicI64::new(0), AtomicI64::new(0)],
        }
    }

    /// Hot path: one relaxed fetch_add on the live slot.
    #[inline]
    pub(crate) fn record(&self, epoch: Epoch, delta: i64) {
        debug_assert_epoch!(epoch.0);
        self.slots[epoch.0].fetch_add(delta, Ordering::Relaxed);
    }

    /// Returns the window total and zeroes the slot for its next turn.
    pub(crate) fn read(&self, epoch: Epoch) -> i64 {
        debug_assert_epoch!(epoch.0);
        self.slots[epoch.0].swap(0, Ordering::Relaxed)
    }
}
