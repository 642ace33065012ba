//! Poll values and their normalization into flat key/value tuples.
//!
//! Every sweep turns each cell into one [`Reading`]. Backends receive the
//! composite reading and call [`Reading::normalize`] to flatten it into
//! `(key, ts, f64)` tuples ready for a wire protocol. Counter-like values are
//! scaled to per-second rates by the window length; gauges, percentiles, and
//! quantile samples pass through unscaled.

use crate::key::KeyBuf;
use tracing::warn;

/// One cell's worth of data for one poll window.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading<'a> {
    /// Host component of the emitted key.
    pub host: &'a str,
    /// Registry prefix component of the emitted key.
    pub prefix: &'a str,
    /// Bare metric name.
    pub name: &'a str,
    /// Pre-joined `prefix.host.name`.
    pub key: &'a str,
    /// Timestamp of the poll that closed the window (unix seconds).
    pub ts: i64,
    /// Window length in seconds, never zero.
    pub elapsed: u64,
    /// Type-specific payload.
    pub value: Value,
}

/// Type-specific poll payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Value {
    /// Total recorded in the window.
    Counter(i64),
    /// Last set level.
    Gauge(f64),
    /// Reservoir summary.
    Dist(DistSummary),
    /// Bucketed counts.
    Histo(HistoSummary),
    /// Streaming quantile estimate.
    Quantile(QuantileSummary),
}

/// Percentiles extracted from a reservoir at read time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DistSummary {
    /// Number of values recorded in the window (not capped by the reservoir).
    pub count: u64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

/// Histogram counts for one window.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HistoSummary {
    /// Values below the lowest threshold.
    pub below: u64,
    /// Values at or above the highest threshold.
    pub above: u64,
    /// Per-bucket counts, keyed by the bucket's exclusive upper threshold.
    pub buckets: Vec<HistoBucket>,
}

/// One half-open histogram bucket `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HistoBucket {
    pub upper: u64,
    pub count: u64,
}

/// Quantile estimator state for one window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuantileSummary {
    /// Target quantile in (0, 1).
    pub quantile: f64,
    /// Current estimate.
    pub sample: f64,
    /// Number of updates observed in the window.
    pub count: u64,
}

#[inline]
fn rate(count: u64, elapsed: u64) -> f64 {
    count as f64 / elapsed as f64
}

impl Reading<'_> {
    /// Flattens this reading into `(key, ts, value)` tuples.
    ///
    /// Re-entrant; backends may call it any number of times during
    /// `on_event`. A suffix that would overflow the key buffer is skipped
    /// with a warning rather than truncated onto the wire.
    pub fn normalize<F>(&self, mut emit: F)
    where
        F: FnMut(&str, i64, f64),
    {
        let mut key = KeyBuf::new();
        if key.push(self.key).is_err() {
            warn!(key = self.key, "key too long, dropping reading");
            return;
        }

        let suffixed = |key: &mut KeyBuf, suffix: &str, value: f64, emit: &mut F| {
            match key.push(suffix) {
                Ok(pos) => {
                    emit(key.as_str(), self.ts, value);
                    key.pop(pos);
                }
                Err(_) => warn!(key = self.key, suffix, "suffixed key too long, skipping"),
            }
        };

        match &self.value {
            Value::Counter(v) => emit(key.as_str(), self.ts, *v as f64 / self.elapsed as f64),
            Value::Gauge(v) => emit(key.as_str(), self.ts, *v),
            Value::Quantile(q) => emit(key.as_str(), self.ts, q.sample),
            Value::Dist(d) => {
                suffixed(&mut key, "count", rate(d.count, self.elapsed), &mut emit);
                suffixed(&mut key, "p50", d.p50, &mut emit);
                suffixed(&mut key, "p90", d.p90, &mut emit);
                suffixed(&mut key, "p99", d.p99, &mut emit);
                suffixed(&mut key, "max", d.max, &mut emit);
            }
            Value::Histo(h) => {
                suffixed(&mut key, "below", rate(h.below, self.elapsed), &mut emit);
                for bucket in &h.buckets {
                    match key.push_fmt(format_args!("{}", bucket.upper)) {
                        Ok(pos) => {
                            emit(key.as_str(), self.ts, rate(bucket.count, self.elapsed));
                            key.pop(pos);
                        }
                        Err(_) => warn!(key = self.key, upper = bucket.upper, "bucket key too long, skipping"),
                    }
                }
                suffixed(&mut key, "above", rate(h.above, self.elapsed), &mut emit);
            }
        }
    }
}
