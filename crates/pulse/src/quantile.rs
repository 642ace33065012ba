//! Streaming quantile cell (Frank-Wolfe-style stochastic approximation).
//!
//! The estimate is `base + multiplier * adjustment`. Each update nudges the
//! multiplier at most one step: a value below the estimate pulls it down
//! with probability `1 - q`, a value at or above pushes it up with
//! probability `q`. At equilibrium the estimate sits at the target quantile.
//!
//! The multiplier is deliberately shared across epochs: the estimate has to
//! evolve continuously across flips. Only the per-window update counters
//! double-buffer.

use crate::epoch::Epoch;
use crate::error::Error;
use crate::invariants::debug_assert_epoch;
use crate::value::QuantileSummary;
use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub(crate) struct QuantileCell {
    quantile: f64,
    estimate: f64,
    adjustment: f64,
    multiplier: AtomicI64,
    counts: [AtomicU64; 2],
}

impl QuantileCell {
    pub(crate) fn new(quantile: f64, estimate: f64, adjustment: f64) -> Result<Self, Error> {
        if !(quantile > 0.0 && quantile < 1.0) {
            return Err(Error::InvalidQuantile(quantile));
        }
        if !(adjustment > 0.0) {
            return Err(Error::InvalidAdjustment(adjustment));
        }
        Ok(Self {
            quantile,
            estimate,
            adjustment,
            multiplier: AtomicI64::new(0),
            counts: [AtomicU64::new(0), AtomicU64::new(0)],
        })
    }

    #[inline]
    fn sample(&self) -> f64 {
        self.estimate + self.multiplier.load(Ordering::Relaxed) as f64 * self.adjustment
    }

    /// Hot path: one Bernoulli draw, at most one relaxed RMW on the
    /// multiplier, one relaxed RMW on the window counter.
    pub(crate) fn record(&self, epoch: Epoch, value: f64) {
        debug_assert_epoch!(epoch.0);
        let estimate = self.sample();
        let hit = rand::thread_rng().gen_bool(self.quantile);
        if value < estimate && !hit {
            self.multiplier.fetch_sub(1, Ordering::Relaxed);
        } else if value >= estimate && hit {
            self.multiplier.fetch_add(1, Ordering::Relaxed);
        }
        self.counts[epoch.0].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current estimate; only the window counter resets.
    pub(crate) fn read(&self, epoch: Epoch) -> QuantileSummary {
        debug_assert_epoch!(epoch.0);
        QuantileSummary {
            quantile: self.quantile,
            sample: self.sample(),
            count: self.counts[epoch.0].swap(0, Ordering::Relaxed),
        }
    }
}
