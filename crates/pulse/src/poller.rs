//! Poller: flips the epoch and sweeps every cell into the backends.
//!
//! One poller per registry. `poll_at` takes `&mut self`, so a single poller
//! cannot overlap its own sweeps; running two pollers against one registry
//! is unsupported and breaks the window accounting.

use crate::backend::{Backend, Event};
use crate::error::Error;
use crate::key::{validate_name, KeyBuf};
use crate::registry::{unix_now, Registry};
use crate::value::Reading;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Poller tuning knobs.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// How long to let straggling recorders finish on the retired slot
    /// before reading it. Zero skips the sleep (tests).
    pub grace: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(1),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Readings delivered to the backends.
    pub cells: usize,
    /// Cells skipped this sweep (busy slot or oversized key).
    pub skipped: usize,
}

/// Drives sweeps over one registry, fanning readings out to backends.
pub struct Poller {
    registry: Registry,
    host: String,
    backends: Vec<Box<dyn Backend>>,
    grace: Duration,
}

impl Poller {
    pub fn new(registry: &Registry) -> Self {
        Self::with_config(registry, PollerConfig::default())
    }

    pub fn with_config(registry: &Registry, config: PollerConfig) -> Self {
        Self {
            registry: registry.clone(),
            host: default_host(),
            backends: Vec::new(),
            grace: config.grace,
        }
    }

    /// Host component of every emitted key. Defaults to `$HOSTNAME`, falling
    /// back to `localhost`.
    pub fn set_host(&mut self, host: &str) -> Result<(), Error> {
        validate_name(host)?;
        self.host = host.to_string();
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Appends a backend; sweeps fan out in registration order.
    pub fn add_backend(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Sweeps at the current wall-clock second.
    pub fn poll(&mut self) -> PollStats {
        self.poll_at(unix_now())
    }

    /// Sweeps at an explicit timestamp (unix seconds).
    ///
    /// Flips the epoch, waits out the straggler grace, then reads and resets
    /// the retired slot of every reachable cell. A busy slot is skipped, not
    /// carried over; `ts` at or before the previous poll clamps the window
    /// to one second.
    pub fn poll_at(&mut self, ts: i64) -> PollStats {
        let (retired, prev_ts) = self.registry.inner.epoch.flip(ts);
        let elapsed = if ts > prev_ts {
            (ts - prev_ts) as u64
        } else {
            if ts < prev_ts {
                warn!(ts, prev_ts, "poll clock went backwards, clamping window to 1s");
            }
            1
        };

        if !self.grace.is_zero() {
            thread::sleep(self.grace);
        }

        for backend in &mut self.backends {
            backend.on_event(Event::Begin);
        }

        let inner = Arc::clone(&self.registry.inner);
        let prefix = inner.prefix();
        let mut key = KeyBuf::new();
        let mut stats = PollStats::default();

        inner.for_each(|cell| {
            key.clear();
            let built = key
                .push(&prefix)
                .and_then(|_| key.push(&self.host))
                .and_then(|_| key.push(cell.name()));
            if built.is_err() {
                warn!(metric = cell.name(), "key overflows, skipping cell");
                stats.skipped += 1;
                return ControlFlow::Continue(());
            }

            match cell.read(retired) {
                Ok(Some(value)) => {
                    let reading = Reading {
                        host: &self.host,
                        prefix: &prefix,
                        name: cell.name(),
                        key: key.as_str(),
                        ts,
                        elapsed,
                        value,
                    };
                    for backend in &mut self.backends {
                        backend.on_event(Event::Metric(&reading));
                    }
                    stats.cells += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(metric = cell.name(), %err, "read failed, dropping window");
                    stats.skipped += 1;
                }
            }
            ControlFlow::Continue(())
        });

        for backend in &mut self.backends {
            backend.on_event(Event::Done);
        }
        stats
    }
}

fn default_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|host| validate_name(host).is_ok())
        .unwrap_or_else(|| "localhost".to_string())
}
