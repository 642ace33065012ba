//! Cell: one live metric instance.
//!
//! A cell is a heap allocation that never moves: the registry links cells
//! into an intrusive list through atomic `next`/`prev` pointers, recorders
//! update the type-specific body through a shared reference, and the poller
//! reads whichever slot the epoch just retired. The body sits behind a
//! cache-line pad; an atomic RMW on a word that straddles a line costs an
//! order of magnitude more.

use crate::counter::CounterCell;
use crate::dist::DistCell;
use crate::epoch::Epoch;
use crate::error::ReadError;
use crate::gauge::GaugeCell;
use crate::histo::HistoCell;
use crate::quantile::QuantileCell;
use crate::value::Value;
use crossbeam_utils::CachePadded;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr};

/// Metric type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Counter,
    Gauge,
    Dist,
    Histo,
    Quantile,
}

impl Kind {
    /// Wire name of the type, as used in error messages and dump backends.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
            Kind::Dist => "dist",
            Kind::Histo => "histo",
            Kind::Quantile => "quantile",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific cell body, two-slot throughout.
pub(crate) enum Body {
    Counter(CounterCell),
    Gauge(GaugeCell),
    Dist(DistCell),
    Histo(HistoCell),
    Quantile(QuantileCell),
}

/// One registered metric.
///
/// `next`/`prev` are owned by the registry: `prev` and both link writes only
/// happen under the registry mutex, while `next` is additionally read without
/// it by lock-free traversal.
///
/// `repr(C)` keeps the cold header (links, name) in declaration order ahead
/// of the padded body, so the recorders' atomics start on their own line.
#[repr(C)]
pub(crate) struct Cell {
    pub(crate) next: AtomicPtr<Cell>,
    pub(crate) prev: AtomicPtr<Cell>,
    /// Cleared exactly once when the cell is unlinked; makes `close`
    /// idempotent even against a stale handle from a previous registration.
    pub(crate) linked: AtomicBool,
    name: Box<str>,
    body: CachePadded<Body>,
}

// Safety: a cell is shared between recorder threads and the poller. Every
// mutable field is an atomic or sits behind the reservoirs' spin locks;
// `name` is immutable after construction.
unsafe impl Send for Cell {}
unsafe impl Sync for Cell {}

impl Cell {
    pub(crate) fn new(name: &str, body: Body) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            prev: AtomicPtr::new(ptr::null_mut()),
            linked: AtomicBool::new(true),
            name: name.into(),
            body: CachePadded::new(body),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn kind(&self) -> Kind {
        match *self.body {
            Body::Counter(_) => Kind::Counter,
            Body::Gauge(_) => Kind::Gauge,
            Body::Dist(_) => Kind::Dist,
            Body::Histo(_) => Kind::Histo,
            Body::Quantile(_) => Kind::Quantile,
        }
    }

    /// Reads and resets the given slot.
    ///
    /// `Ok(None)` means the cell has nothing to report this window (a gauge
    /// that was never set); `Err(Busy)` means a straggling recorder holds the
    /// retired reservoir slot and the window is skipped, not carried over.
    pub(crate) fn read(&self, epoch: Epoch) -> Result<Option<Value>, ReadError> {
        match &*self.body {
            Body::Counter(c) => Ok(Some(Value::Counter(c.read(epoch)))),
            Body::Gauge(g) => Ok(g.read(epoch).map(Value::Gauge)),
            Body::Dist(d) => d.read(epoch).map(|s| Some(Value::Dist(s))),
            Body::Histo(h) => Ok(Some(Value::Histo(h.read(epoch)))),
            Body::Quantile(q) => Ok(Some(Value::Quantile(q.read(epoch)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_display() {
        let cell = Cell::new("reqs", Body::Counter(CounterCell::new()));
        assert_eq!(cell.kind(), Kind::Counter);
        assert_eq!(cell.kind().to_string(), "counter");
        assert_eq!(cell.name(), "reqs");
    }

    #[test]
    fn read_dispatches_by_body() {
        let epoch = Epoch(0);
        let cell = Cell::new("c", Body::Counter(CounterCell::new()));
        match cell.read(epoch) {
            Ok(Some(Value::Counter(0))) => {}
            other => panic!("unexpected read: {other:?}"),
        }

        let cell = Cell::new("g", Body::Gauge(GaugeCell::new()));
        match cell.read(epoch) {
            Ok(Some(Value::Gauge(v))) => assert_eq!(v, 0.0),
            other => panic!("unexpected read: {other:?}"),
        }
    }
}
