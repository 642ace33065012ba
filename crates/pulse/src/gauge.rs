//! Gauge cell: two bit-punned IEEE-754 doubles indexed by epoch.
//!
//! Gauges are levels, not deltas, so a read must not lose the level: the
//! poller swaps a NaN sentinel into the retired slot and, when it found a
//! value, re-arms the opposite slot with it. A slot left at NaN therefore
//! means "nothing to report this window": either the cell was already read
//! this epoch, or the only write since was an explicit NaN. Fresh gauges
//! start at 0.0 in both slots and report that level until first set.

use crate::epoch::Epoch;
use crate::invariants::debug_assert_epoch;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct GaugeCell {
    slots: [AtomicU64; 2],
}

impl GaugeCell {
    pub(crate) fn new() -> Self {
        Self {
            slots: [
                AtomicU64::new(0f64.to_bits()),
                AtomicU64::new(0f64.to_bits()),
            ],
        }
    }

    /// Hot path: one relaxed store of the raw bits on the live slot.
    ///
    /// Storing NaN is allowed and reads back as "no value".
    #[inline]
    pub(crate) fn record(&self, epoch: Epoch, value: f64) {
        debug_assert_epoch!(epoch.0);
        self.slots[epoch.0].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Takes the retired slot's level, if any, carrying it into the live slot.
    ///
    /// The carry store races with a concurrent `record` on the live slot; if
    /// the recorder loses, the next poll reports the stale level for one
    /// window.
    pub(crate) fn read(&self, epoch: Epoch) -> Option<f64> {
        debug_assert_epoch!(epoch.0);
        let value = f64::from_bits(
            self.slots[epoch.0].swap(f64::NAN.to_bits(), Ordering::Relaxed),
        );
        if value.is_nan() {
            return None;
        }
        self.slots[epoch.other().0].store(value.to_bits(), Ordering::Relaxed);
        Some(value)
    }
}
