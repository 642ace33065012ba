//! Registry: named metric cells, lock-free traversal, deferred reclamation.
//!
//! Structural changes (create, open, close, prefix) serialise on one mutex;
//! the name map and the intrusive list always change together under it. The
//! list head and `next` chain are additionally readable without the mutex,
//! which is what lets the poller sweep cells while recorders and registrars
//! keep running.
//!
//! Ownership: the map holds one `Arc<Cell>` per live cell and every handle
//! holds another. Closing moves the map's Arc onto the current epoch's
//! retire queue, where it survives until the second flip after the unlink.
//! A handle kept past `close` stays valid; it just records into a cell the
//! poller can no longer reach.

use crate::cell::{Body, Cell, Kind};
use crate::counter::CounterCell;
use crate::dist::DistCell;
use crate::epoch::{Epoch, EpochState};
use crate::error::{Error, ReadError};
use crate::gauge::GaugeCell;
use crate::histo::HistoCell;
use crate::key::validate_name;
use crate::quantile::QuantileCell;
use crate::value::{DistSummary, HistoSummary, QuantileSummary};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Shared registry of named metrics.
///
/// Cheap to clone; clones share the same cells and epoch.
#[derive(Clone)]
pub struct Registry {
    pub(crate) inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    state: Mutex<State>,
    head: AtomicPtr<Cell>,
    pub(crate) epoch: EpochState,
}

struct State {
    prefix: String,
    cells: HashMap<Box<str>, Arc<Cell>>,
}

impl Registry {
    /// Creates a registry whose first poll window starts now.
    pub fn new(prefix: &str) -> Result<Self, Error> {
        Self::with_start(prefix, unix_now())
    }

    /// Creates a registry whose first poll window starts at `start_ts`.
    pub fn with_start(prefix: &str, start_ts: i64) -> Result<Self, Error> {
        validate_name(prefix)?;
        Ok(Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(State {
                    prefix: prefix.to_string(),
                    cells: HashMap::new(),
                }),
                head: AtomicPtr::new(std::ptr::null_mut()),
                epoch: EpochState::new(start_ts),
            }),
        })
    }

    pub fn prefix(&self) -> String {
        self.inner.state.lock().unwrap().prefix.clone()
    }

    pub fn set_prefix(&self, prefix: &str) -> Result<(), Error> {
        validate_name(prefix)?;
        self.inner.state.lock().unwrap().prefix = prefix.to_string();
        Ok(())
    }

    /// Epoch recorders are writing to right now.
    pub fn epoch(&self) -> Epoch {
        self.inner.epoch.current()
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a new counter; fails if the name is taken.
    pub fn counter(&self, name: &str) -> Result<Counter, Error> {
        let cell = self.inner.create(name, Body::Counter(CounterCell::new()))?;
        Ok(Counter { cell, inner: Arc::clone(&self.inner) })
    }

    /// Returns the existing counter or registers a new one.
    pub fn counter_open(&self, name: &str) -> Result<Counter, Error> {
        let cell = self
            .inner
            .open(name, Kind::Counter, || Ok(Body::Counter(CounterCell::new())))?;
        Ok(Counter { cell, inner: Arc::clone(&self.inner) })
    }

    /// Registers a new gauge; fails if the name is taken.
    pub fn gauge(&self, name: &str) -> Result<Gauge, Error> {
        let cell = self.inner.create(name, Body::Gauge(GaugeCell::new()))?;
        Ok(Gauge { cell, inner: Arc::clone(&self.inner) })
    }

    /// Returns the existing gauge or registers a new one.
    pub fn gauge_open(&self, name: &str) -> Result<Gauge, Error> {
        let cell = self
            .inner
            .open(name, Kind::Gauge, || Ok(Body::Gauge(GaugeCell::new())))?;
        Ok(Gauge { cell, inner: Arc::clone(&self.inner) })
    }

    /// Registers a new distribution; fails if the name is taken.
    pub fn dist(&self, name: &str) -> Result<Dist, Error> {
        let cell = self.inner.create(name, Body::Dist(DistCell::new()))?;
        Ok(Dist { cell, inner: Arc::clone(&self.inner) })
    }

    /// Returns the existing distribution or registers a new one.
    pub fn dist_open(&self, name: &str) -> Result<Dist, Error> {
        let cell = self
            .inner
            .open(name, Kind::Dist, || Ok(Body::Dist(DistCell::new())))?;
        Ok(Dist { cell, inner: Arc::clone(&self.inner) })
    }

    /// Registers a new histogram over strictly ascending thresholds.
    pub fn histo(&self, name: &str, edges: &[u64]) -> Result<Histo, Error> {
        let cell = self
            .inner
            .create(name, Body::Histo(HistoCell::new(edges)?))?;
        Ok(Histo { cell, inner: Arc::clone(&self.inner) })
    }

    /// Returns the existing histogram or registers a new one.
    ///
    /// When the name already exists, its original thresholds stay in force.
    pub fn histo_open(&self, name: &str, edges: &[u64]) -> Result<Histo, Error> {
        let cell = self
            .inner
            .open(name, Kind::Histo, || Ok(Body::Histo(HistoCell::new(edges)?)))?;
        Ok(Histo { cell, inner: Arc::clone(&self.inner) })
    }

    /// Registers a new quantile estimator targeting `quantile` in (0, 1).
    pub fn quantile(
        &self,
        name: &str,
        quantile: f64,
        estimate: f64,
        adjustment: f64,
    ) -> Result<Quantile, Error> {
        let cell = self.inner.create(
            name,
            Body::Quantile(QuantileCell::new(quantile, estimate, adjustment)?),
        )?;
        Ok(Quantile { cell, inner: Arc::clone(&self.inner) })
    }

    /// Returns the existing estimator or registers a new one.
    pub fn quantile_open(
        &self,
        name: &str,
        quantile: f64,
        estimate: f64,
        adjustment: f64,
    ) -> Result<Quantile, Error> {
        let cell = self.inner.open(name, Kind::Quantile, || {
            Ok(Body::Quantile(QuantileCell::new(quantile, estimate, adjustment)?))
        })?;
        Ok(Quantile { cell, inner: Arc::clone(&self.inner) })
    }

    /// Looks up a metric by name, whatever its type.
    pub fn metric(&self, name: &str) -> Option<Metric> {
        let cell = Arc::clone(self.inner.state.lock().unwrap().cells.get(name)?);
        let inner = Arc::clone(&self.inner);
        Some(match cell.kind() {
            Kind::Counter => Metric::Counter(Counter { cell, inner }),
            Kind::Gauge => Metric::Gauge(Gauge { cell, inner }),
            Kind::Dist => Metric::Dist(Dist { cell, inner }),
            Kind::Histo => Metric::Histo(Histo { cell, inner }),
            Kind::Quantile => Metric::Quantile(Quantile { cell, inner }),
        })
    }
}

impl RegistryInner {
    fn create(&self, name: &str, body: Body) -> Result<Arc<Cell>, Error> {
        validate_name(name)?;
        let mut state = self.state.lock().unwrap();
        if state.cells.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        Ok(self.link(&mut state, name, body))
    }

    fn open(
        &self,
        name: &str,
        kind: Kind,
        make: impl FnOnce() -> Result<Body, Error>,
    ) -> Result<Arc<Cell>, Error> {
        validate_name(name)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.cells.get(name) {
            if existing.kind() != kind {
                return Err(Error::KindMismatch {
                    name: name.to_string(),
                    actual: existing.kind(),
                    requested: kind,
                });
            }
            return Ok(Arc::clone(existing));
        }
        let body = make()?;
        Ok(self.link(&mut state, name, body))
    }

    /// Links a fresh cell at the list head and into the name map.
    ///
    /// Must hold the state mutex. The Release store of the head is what
    /// publishes the fully initialised cell to lock-free traversal.
    fn link(&self, state: &mut State, name: &str, body: Body) -> Arc<Cell> {
        let cell = Arc::new(Cell::new(name, body));
        let ptr = Arc::as_ptr(&cell) as *mut Cell;

        let old_head = self.head.load(Ordering::Relaxed);
        cell.next.store(old_head, Ordering::Relaxed);
        if !old_head.is_null() {
            // SAFETY: the old head is a live cell owned by the map; only
            // this mutex-holding thread writes links.
            unsafe { (*old_head).prev.store(ptr, Ordering::Relaxed) };
        }
        self.head.store(ptr, Ordering::Release);

        state.cells.insert(name.into(), Arc::clone(&cell));
        cell
    }

    /// Unlinks a cell and parks it on the current retire queue.
    ///
    /// Idempotent: a second close through a stale handle is a no-op, even if
    /// the name has since been re-registered as a different cell.
    pub(crate) fn close(&self, cell: &Arc<Cell>) -> bool {
        let mut state = self.state.lock().unwrap();
        if !cell.linked.swap(false, Ordering::Relaxed) {
            return false;
        }

        if let Some(current) = state.cells.get(cell.name()) {
            if Arc::ptr_eq(current, cell) {
                state.cells.remove(cell.name());
            }
        }

        let ptr = Arc::as_ptr(cell) as *mut Cell;
        let prev = cell.prev.load(Ordering::Relaxed);
        let next = cell.next.load(Ordering::Relaxed);
        if !next.is_null() {
            // SAFETY: neighbours of a linked cell are linked cells, alive in
            // the map; link writes happen only under the state mutex.
            unsafe { (*next).prev.store(prev, Ordering::Relaxed) };
        }
        if prev.is_null() {
            debug_assert_eq!(self.head.load(Ordering::Relaxed), ptr);
            self.head.store(next, Ordering::Release);
        } else {
            // SAFETY: as above.
            unsafe { (*prev).next.store(next, Ordering::Release) };
        }

        // The unlinked cell keeps its own `next` so a traversal already past
        // the head can still step over it.
        self.epoch.retire(Arc::clone(cell));
        true
    }

    /// Lock-free traversal of every cell linked before the head load.
    ///
    /// Confined to the crate: the reclamation argument needs every traversal
    /// to finish before the next epoch flip, which holds for the single
    /// poller (it flips and traverses from the same call) and for tests.
    pub(crate) fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&Cell) -> ControlFlow<()>,
    {
        let mut ptr = self.head.load(Ordering::Acquire);
        while !ptr.is_null() {
            // SAFETY: the cell was published by a Release head store and is
            // dropped no earlier than two flips after its unlink; no flip
            // can complete while this traversal runs.
            let cell = unsafe { &*ptr };
            if visit(cell).is_break() {
                break;
            }
            ptr = cell.next.load(Ordering::Relaxed);
        }
    }

    pub(crate) fn prefix(&self) -> String {
        self.state.lock().unwrap().prefix.clone()
    }
}

/// A registered metric of any type.
pub enum Metric {
    Counter(Counter),
    Gauge(Gauge),
    Dist(Dist),
    Histo(Histo),
    Quantile(Quantile),
}

impl Metric {
    pub fn kind(&self) -> Kind {
        match self {
            Metric::Counter(_) => Kind::Counter,
            Metric::Gauge(_) => Kind::Gauge,
            Metric::Dist(_) => Kind::Dist,
            Metric::Histo(_) => Kind::Histo,
            Metric::Quantile(_) => Kind::Quantile,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Metric::Counter(m) => m.name(),
            Metric::Gauge(m) => m.name(),
            Metric::Dist(m) => m.name(),
            Metric::Histo(m) => m.name(),
            Metric::Quantile(m) => m.name(),
        }
    }

    /// Unlinks the metric; see the per-type `close`.
    pub fn close(self) -> bool {
        match self {
            Metric::Counter(m) => m.close(),
            Metric::Gauge(m) => m.close(),
            Metric::Dist(m) => m.close(),
            Metric::Histo(m) => m.close(),
            Metric::Quantile(m) => m.close(),
        }
    }
}

/// Monotonically accumulating count, reported as a per-second rate.
#[derive(Clone)]
pub struct Counter {
    cell: Arc<Cell>,
    inner: Arc<RegistryInner>,
}

impl Counter {
    fn body(&self) -> &CounterCell {
        match self.cell.body() {
            Body::Counter(c) => c,
            _ => unreachable!("counter handle holds a counter cell"),
        }
    }

    /// Adds `delta` to the current window. One relaxed atomic op.
    #[inline]
    pub fn inc(&self, delta: i64) {
        self.body().record(self.inner.epoch.current(), delta);
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Reads and resets the given slot. Poller/test entry point.
    pub fn read(&self, epoch: Epoch) -> i64 {
        self.body().read(epoch)
    }

    /// Unlinks the metric from its registry.
    ///
    /// Returns `false` if it was already closed. The backing cell is freed
    /// two epoch flips later, once no reader can hold it.
    pub fn close(self) -> bool {
        self.inner.close(&self.cell)
    }
}

/// Last-set level, reported as-is each window.
#[derive(Clone)]
pub struct Gauge {
    cell: Arc<Cell>,
    inner: Arc<RegistryInner>,
}

impl Gauge {
    fn body(&self) -> &GaugeCell {
        match self.cell.body() {
            Body::Gauge(g) => g,
            _ => unreachable!("gauge handle holds a gauge cell"),
        }
    }

    /// Sets the level. One relaxed atomic store; NaN reads back as unset.
    #[inline]
    pub fn set(&self, value: f64) {
        self.body().record(self.inner.epoch.current(), value);
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Reads the given slot; `None` means nothing to report this window.
    pub fn read(&self, epoch: Epoch) -> Option<f64> {
        self.body().read(epoch)
    }

    pub fn close(self) -> bool {
        self.inner.close(&self.cell)
    }
}

/// Reservoir-sampled value distribution.
#[derive(Clone)]
pub struct Dist {
    cell: Arc<Cell>,
    inner: Arc<RegistryInner>,
}

impl Dist {
    fn body(&self) -> &DistCell {
        match self.cell.body() {
            Body::Dist(d) => d,
            _ => unreachable!("dist handle holds a dist cell"),
        }
    }

    /// Records one value. Bounded spin-lock section on the live slot.
    #[inline]
    pub fn record(&self, value: f64) {
        self.body().record(self.inner.epoch.current(), value);
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Reads and resets the given slot, or reports it busy.
    pub fn read(&self, epoch: Epoch) -> Result<DistSummary, ReadError> {
        self.body().read(epoch)
    }

    /// Holds a slot's lock, simulating a straggling recorder.
    #[cfg(test)]
    pub(crate) fn lock_slot(&self, epoch: Epoch) -> crate::sync::SpinGuard<'_, crate::dist::Reservoir> {
        self.body().lock_slot(epoch)
    }

    pub fn close(self) -> bool {
        self.inner.close(&self.cell)
    }
}

/// Fixed-threshold histogram.
#[derive(Clone)]
pub struct Histo {
    cell: Arc<Cell>,
    inner: Arc<RegistryInner>,
}

impl Histo {
    fn body(&self) -> &HistoCell {
        match self.cell.body() {
            Body::Histo(h) => h,
            _ => unreachable!("histo handle holds a histo cell"),
        }
    }

    /// Counts one value into its bucket. One relaxed atomic op.
    #[inline]
    pub fn record(&self, value: u64) {
        self.body().record(self.inner.epoch.current(), value);
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Reads and resets the given slot.
    pub fn read(&self, epoch: Epoch) -> HistoSummary {
        self.body().read(epoch)
    }

    pub fn close(self) -> bool {
        self.inner.close(&self.cell)
    }
}

/// Streaming quantile estimator.
#[derive(Clone)]
pub struct Quantile {
    cell: Arc<Cell>,
    inner: Arc<RegistryInner>,
}

impl Quantile {
    fn body(&self) -> &QuantileCell {
        match self.cell.body() {
            Body::Quantile(q) => q,
            _ => unreachable!("quantile handle holds a quantile cell"),
        }
    }

    /// Feeds one observation to the estimator.
    #[inline]
    pub fn update(&self, value: f64) {
        self.body().record(self.inner.epoch.current(), value);
    }

    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Reads the estimate; only the window counter resets.
    pub fn read(&self, epoch: Epoch) -> QuantileSummary {
        self.body().read(epoch)
    }

    pub fn close(self) -> bool {
        self.inner.close(&self.cell)
    }
}
