//! Distribution cell: two reservoir-sampled windows of 200 values.
//!
//! Recording locks the live slot's spin lock for a few stores; with fewer
//! than 200 values the reservoir is exact, beyond that each value replaces a
//! random slot (Algorithm R), keeping every recorded value equally likely to
//! survive. The poller `try_lock`s the retired slot only; a failed attempt
//! reports the slot busy and leaves it intact for the next sweep.

use crate::epoch::Epoch;
use crate::error::ReadError;
use crate::invariants::{debug_assert_epoch, debug_assert_reservoir_fill};
use crate::sync::SpinLock;
use crate::value::DistSummary;
use rand::Rng;

/// Reservoir capacity per slot.
pub const RESERVOIR_LEN: usize = 200;

pub(crate) struct Reservoir {
    /// Values recorded this window, not capped by the reservoir.
    n: u64,
    max: f64,
    samples: [f64; RESERVOIR_LEN],
}

impl Reservoir {
    const fn new() -> Self {
        Self {
            n: 0,
            max: 0.0,
            samples: [0.0; RESERVOIR_LEN],
        }
    }

    fn record(&mut self, value: f64) {
        let slot = if self.n < RESERVOIR_LEN as u64 {
            self.n as usize
        } else {
            rand::thread_rng().gen_range(0..=self.n) as usize
        };
        if slot < RESERVOIR_LEN {
            self.samples[slot] = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.n += 1;
    }

    /// Copies the populated prefix out and resets the window.
    fn take(&mut self) -> (u64, f64, Vec<f64>) {
        let fill = (self.n as usize).min(RESERVOIR_LEN);
        debug_assert_reservoir_fill!(fill, RESERVOIR_LEN);
        let samples = self.samples[..fill].to_vec();
        let n = self.n;
        let max = self.max;
        self.n = 0;
        self.max = 0.0;
        (n, max, samples)
    }
}

pub(crate) struct DistCell {
    slots: [SpinLock<Reservoir>; 2],
}

impl DistCell {
    pub(crate) fn new() -> Self {
        Self {
            slots: [
                SpinLock::new(Reservoir::new()),
                SpinLock::new(Reservoir::new()),
            ],
        }
    }

    /// Hot path: bounded spin-lock section on the live slot.
    pub(crate) fn record(&self, epoch: Epoch, value: f64) {
        debug_assert_epoch!(epoch.0);
        self.slots[epoch.0].lock().record(value);
    }

    /// Drains the retired slot into percentiles, or reports it busy.
    pub(crate) fn read(&self, epoch: Epoch) -> Result<DistSummary, ReadError> {
        debug_assert_epoch!(epoch.0);
        let mut guard = self.slots[epoch.0].try_lock().ok_or(ReadError::Busy)?;
        let (n, max, mut samples) = guard.take();
        drop(guard);

        samples.sort_unstable_by(f64::total_cmp);
        Ok(DistSummary {
            count: n,
            p50: percentile(&samples, 0.50),
            p90: percentile(&samples, 0.90),
            p99: percentile(&samples, 0.99),
            max,
        })
    }

    /// Holds a slot's lock, simulating a straggling recorder.
    #[cfg(test)]
    pub(crate) fn lock_slot(&self, epoch: Epoch) -> crate::sync::SpinGuard<'_, Reservoir> {
        self.slots[epoch.0].lock()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted[(p * (sorted.len() - 1) as f64) as usize]
}
