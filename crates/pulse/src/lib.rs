//! pulse - epoch-flipped in-process metrics
//!
//! Metrics for services that cannot afford to stop and count: recording is
//! one relaxed atomic operation (or a bounded spin for distributions), while
//! a single poller concurrently drains completed windows and fans them out
//! to export backends.
//!
//! Every cell keeps two slots. Recorders write the slot selected by the
//! global epoch bit; each poll flips the bit, waits a short straggler grace,
//! then reads and resets the slot that just retired. Closed cells are parked
//! on a retire queue and dropped two flips later, so nothing a reader can
//! still reach is ever freed.
//!
//! # Key Features
//!
//! - Record path: one relaxed atomic op, allocation-free
//! - Counter, gauge, reservoir distribution, histogram, quantile estimator
//! - Lock-free registry traversal with epoch-deferred reclamation
//! - Backend fan-out of normalized `(key, ts, value)` tuples per sweep
//!
//! # Example
//!
//! ```
//! use pulse::{MemoryBackend, Poller, Registry};
//!
//! let registry = Registry::with_start("myapp", 0).unwrap();
//! let requests = registry.counter("requests").unwrap();
//! let latency = registry.dist("latency_us").unwrap();
//!
//! // Hot path: cheap enough for per-request use.
//! requests.inc(1);
//! latency.record(180.0);
//!
//! let capture = MemoryBackend::new();
//! let mut poller = Poller::new(&registry);
//! poller.set_host("web-01").unwrap();
//! poller.add_backend(Box::new(capture.clone()));
//!
//! poller.poll_at(10);
//! assert_eq!(capture.last_values()["myapp.web-01.requests"], 0.1);
//! ```

mod backend;
mod cell;
mod counter;
mod dist;
mod epoch;
mod error;
mod gauge;
mod histo;
mod invariants;
mod key;
mod poller;
mod quantile;
mod registry;
mod sync;
mod value;

pub use backend::{Backend, Event, MemoryBackend, NullBackend};
pub use cell::Kind;
pub use dist::RESERVOIR_LEN;
pub use epoch::Epoch;
pub use error::{Error, ReadError};
pub use histo::MAX_BUCKETS;
pub use key::{KeyBuf, MAX_KEY_LEN, MAX_NAME_LEN};
pub use poller::{PollStats, Poller, PollerConfig};
pub use registry::{Counter, Dist, Gauge, Histo, Metric, Quantile, Registry};
pub use value::{
    DistSummary, HistoBucket, HistoSummary, QuantileSummary, Reading, Value,
};
