//! End-to-end: registry -> poller -> export backends.

use pulse::{Poller, PollerConfig, Registry};
use pulse_export::{CarbonBackend, DumpBackend, JsonBackend};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Cloneable writer so the test can inspect what a boxed backend wrote.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn quiet_poller(registry: &Registry) -> Poller {
    let mut poller = Poller::with_config(
        registry,
        PollerConfig {
            grace: Duration::ZERO,
        },
    );
    poller.set_host("host").unwrap();
    poller
}

#[test]
fn dump_and_json_see_the_same_sweep() {
    let registry = Registry::with_start("app", 0).unwrap();
    let mut poller = quiet_poller(&registry);

    let dump_buf = SharedBuf::default();
    let json_buf = SharedBuf::default();
    poller.add_backend(Box::new(DumpBackend::new(dump_buf.clone())));
    poller.add_backend(Box::new(JsonBackend::new(json_buf.clone())));

    registry.counter("reqs").unwrap().inc(4);
    registry.gauge("load").unwrap().set(1.5);
    poller.poll_at(2);

    let dump = dump_buf.contents();
    assert!(dump.contains("[2] app.host.reqs 2\n"));
    assert!(dump.contains("[2] app.host.load 1.5\n"));

    let json = json_buf.contents();
    let lines: Vec<serde_json::Value> = json
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line["ts"], 2);
    }
    // Same flat tuples the dump backend printed.
    let by_key: std::collections::HashMap<&str, f64> = lines
        .iter()
        .map(|line| (line["key"].as_str().unwrap(), line["value"].as_f64().unwrap()))
        .collect();
    assert_eq!(by_key["app.host.reqs"], 2.0);
    assert_eq!(by_key["app.host.load"], 1.5);
}

#[test]
fn carbon_receives_every_poll_window() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut received = String::new();
        conn.read_to_string(&mut received).unwrap();
        received
    });

    let registry = Registry::with_start("app", 0).unwrap();
    let mut poller = quiet_poller(&registry);
    poller.add_backend(Box::new(CarbonBackend::new(addr.to_string())));

    let counter = registry.counter("reqs").unwrap();
    counter.inc(3);
    poller.poll_at(1);
    counter.inc(6);
    poller.poll_at(3);

    // Dropping the poller drops the backend and closes the socket.
    drop(poller);

    let received = server.join().unwrap();
    assert_eq!(received, "app.host.reqs 3 1\napp.host.reqs 3 3\n");
}
