//! Human-readable dump backend, for debugging a live service.

use pulse::{Backend, Event};
use std::io::{self, Write};
use tracing::debug;

/// Writes one `[ts] key value` line per normalized sample.
pub struct DumpBackend<W: Write + Send> {
    out: W,
}

impl DumpBackend<io::Stdout> {
    /// Dumps sweeps to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> DumpBackend<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Borrows the underlying writer (tests, mostly).
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Backend for DumpBackend<W> {
    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Begin => {}
            Event::Metric(reading) => {
                reading.normalize(|key, ts, value| {
                    if let Err(err) = writeln!(self.out, "[{ts}] {key} {value}") {
                        debug!(%err, "dump write failed");
                    }
                });
            }
            Event::Done => {
                if let Err(err) = self.out.flush() {
                    debug!(%err, "dump flush failed");
                }
            }
        }
    }
}
