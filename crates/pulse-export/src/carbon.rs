//! Carbon (Graphite) plaintext line-protocol backend.
//!
//! Normalized samples buffer during the sweep and go out in one TCP write on
//! `Done`. The connection is established lazily and dropped on any error;
//! the sweep that hit the error is discarded, never retried.

use pulse::{Backend, Event};
use std::fmt::Write as _;
use std::io::Write;
use std::net::TcpStream;
use tracing::warn;

/// Ships `key value ts` lines to a Carbon-compatible socket.
pub struct CarbonBackend {
    addr: String,
    stream: Option<TcpStream>,
    buf: String,
}

impl CarbonBackend {
    /// Target is anything `TcpStream::connect` accepts, e.g. `"host:2003"`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            buf: String::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether a connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn flush_sweep(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        if self.stream.is_none() {
            match TcpStream::connect(&self.addr) {
                Ok(stream) => {
                    // Sweeps are small and rare; latency beats batching.
                    let _ = stream.set_nodelay(true);
                    self.stream = Some(stream);
                }
                Err(err) => {
                    warn!(addr = %self.addr, %err, "carbon connect failed, dropping sweep");
                    self.buf.clear();
                    return;
                }
            }
        }

        let result = match self.stream.as_mut() {
            Some(stream) => stream
                .write_all(self.buf.as_bytes())
                .and_then(|()| stream.flush()),
            None => return,
        };
        if let Err(err) = result {
            warn!(addr = %self.addr, %err, "carbon write failed, dropping sweep and connection");
            self.stream = None;
        }
        self.buf.clear();
    }
}

impl Backend for CarbonBackend {
    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Begin => self.buf.clear(),
            Event::Metric(reading) => {
                reading.normalize(|key, ts, value| {
                    // Infallible for String.
                    let _ = writeln!(self.buf, "{key} {value} {ts}");
                });
            }
            Event::Done => self.flush_sweep(),
        }
    }
}
