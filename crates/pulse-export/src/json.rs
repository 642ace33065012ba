//! JSON-lines backend: one object per normalized sample.

use pulse::{Backend, Event};
use serde::Serialize;
use std::io::{self, Write};
use tracing::debug;

/// Writes each normalized `(key, ts, value)` tuple as one JSON object per
/// line, the same flat shape the dump and Carbon backends emit.
pub struct JsonBackend<W: Write + Send> {
    out: W,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    key: &'a str,
    ts: i64,
    value: f64,
}

impl<W: Write + Send> JsonBackend<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, key: &str, ts: i64, value: f64) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &JsonLine { key, ts, value })?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write + Send> Backend for JsonBackend<W> {
    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Begin => {}
            Event::Metric(reading) => {
                reading.normalize(|key, ts, value| {
                    if let Err(err) = self.write_line(key, ts, value) {
                        debug!(%err, "json write failed");
                    }
                });
            }
            Event::Done => {
                if let Err(err) = self.out.flush() {
                    debug!(%err, "json flush failed");
                }
            }
        }
    }
}
