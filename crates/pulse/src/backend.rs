//! Backend contract: per-sweep begin/metric/done events.
//!
//! A sweep delivers exactly one `Begin`, one `Metric` per reading in
//! unspecified order, and one `Done`, to every registered backend in
//! registration order. Readings are borrowed; a backend that needs data past
//! `on_event` copies what it needs (the capture backend below does exactly
//! that).

use crate::value::Reading;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One poller event.
#[derive(Debug)]
pub enum Event<'a> {
    /// A sweep is starting.
    Begin,
    /// One cell's reading for the closed window.
    Metric(&'a Reading<'a>),
    /// The sweep is complete.
    Done,
}

/// Sink for poll sweeps.
///
/// Dropping the backend is the teardown hook; flush buffered state in `Drop`.
pub trait Backend: Send {
    fn on_event(&mut self, event: Event<'_>);
}

/// Discards every event. Handy for benchmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn on_event(&mut self, _event: Event<'_>) {}
}

/// Captures normalized sweeps in memory for assertions and debugging.
///
/// Clones share storage, so keep one clone and hand the other to the poller.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// Flattened `(key, ts, value)` tuples per sweep, in delivery order.
    sweeps: Vec<Vec<(String, i64, f64)>>,
    completed: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed sweeps.
    pub fn sweeps(&self) -> usize {
        self.inner.lock().unwrap().completed
    }

    /// Flattened samples of sweep `index`, in delivery order.
    pub fn sweep(&self, index: usize) -> Vec<(String, i64, f64)> {
        self.inner.lock().unwrap().sweeps[index].clone()
    }

    /// Key → value map of sweep `index`.
    pub fn sweep_values(&self, index: usize) -> HashMap<String, f64> {
        self.sweep(index)
            .into_iter()
            .map(|(key, _, value)| (key, value))
            .collect()
    }

    /// Key → value map of the most recent completed sweep.
    pub fn last_values(&self) -> HashMap<String, f64> {
        let completed = self.sweeps();
        if completed == 0 {
            return HashMap::new();
        }
        self.sweep_values(completed - 1)
    }
}

impl Backend for MemoryBackend {
    fn on_event(&mut self, event: Event<'_>) {
        let mut inner = self.inner.lock().unwrap();
        match event {
            Event::Begin => inner.sweeps.push(Vec::new()),
            Event::Metric(reading) => {
                if let Some(sweep) = inner.sweeps.last_mut() {
                    reading.normalize(|key, ts, value| sweep.push((key.to_string(), ts, value)));
                }
            }
            Event::Done => inner.completed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn memory_backend_tracks_sweeps() {
        let capture = MemoryBackend::new();
        let mut sink: Box<dyn Backend> = Box::new(capture.clone());

        let reading = Reading {
            host: "host",
            prefix: "prefix",
            name: "reqs",
            key: "prefix.host.reqs",
            ts: 5,
            elapsed: 1,
            value: Value::Counter(7),
        };

        sink.on_event(Event::Begin);
        sink.on_event(Event::Metric(&reading));
        sink.on_event(Event::Done);

        assert_eq!(capture.sweeps(), 1);
        assert_eq!(capture.sweep(0), vec![("prefix.host.reqs".to_string(), 5, 7.0)]);
        assert_eq!(capture.last_values()["prefix.host.reqs"], 7.0);
    }

    #[test]
    fn empty_capture_has_no_values() {
        let capture = MemoryBackend::new();
        assert_eq!(capture.sweeps(), 0);
        assert!(capture.last_values().is_empty());
    }
}
