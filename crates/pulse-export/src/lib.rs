//! Export backends for the `pulse` metrics core.
//!
//! Each backend implements [`pulse::Backend`] and is registered with a
//! poller via `add_backend`. All of them are best-effort, like the core's
//! read path: a failed write logs a warning and drops that sweep rather
//! than blocking or buffering without bound.
//!
//! # Example
//!
//! ```no_run
//! use pulse::{Poller, Registry};
//! use pulse_export::{CarbonBackend, DumpBackend};
//!
//! let registry = Registry::new("myapp").unwrap();
//! let mut poller = Poller::new(&registry);
//! poller.add_backend(Box::new(DumpBackend::stdout()));
//! poller.add_backend(Box::new(CarbonBackend::new("graphite.internal:2003")));
//! poller.poll();
//! ```

mod carbon;
mod json;
mod stdout;

pub use carbon::CarbonBackend;
pub use json::JsonBackend;
pub use stdout::DumpBackend;
