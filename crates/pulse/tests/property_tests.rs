//! Property-based tests for the window accounting invariants.
//!
//! Coverage:
//! - Counter totals are conserved across arbitrary inc/poll interleavings
//! - Histogram bucketing agrees with a naive linear classifier
//! - Distribution percentiles are exact below reservoir capacity
//! - Gauges report the last written level
//! - Key builder stays bounded and restores exactly

use proptest::prelude::*;
use pulse::{KeyBuf, MemoryBackend, Poller, PollerConfig, Registry, MAX_KEY_LEN};
use std::time::Duration;

fn poller_with_capture(registry: &Registry) -> (Poller, MemoryBackend) {
    let capture = MemoryBackend::new();
    let mut poller = Poller::with_config(
        registry,
        PollerConfig {
            grace: Duration::ZERO,
        },
    );
    poller.set_host("host").unwrap();
    poller.add_backend(Box::new(capture.clone()));
    (poller, capture)
}

#[derive(Debug, Clone)]
enum Op {
    Inc(i64),
    Poll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..1_000).prop_map(Op::Inc),
        Just(Op::Poll),
    ]
}

proptest! {
    /// Nothing recorded is ever lost or double-counted, however polls and
    /// increments interleave (one-second windows throughout).
    #[test]
    fn counter_totals_are_conserved(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let registry = Registry::with_start("p", 0).unwrap();
        let (mut poller, capture) = poller_with_capture(&registry);
        let counter = registry.counter("c").unwrap();

        let mut recorded: i64 = 0;
        let mut ts = 1;
        for op in ops {
            match op {
                Op::Inc(delta) => {
                    counter.inc(delta);
                    recorded += delta;
                }
                Op::Poll => {
                    poller.poll_at(ts);
                    ts += 1;
                }
            }
        }
        // Flush both slots.
        poller.poll_at(ts);
        poller.poll_at(ts + 1);

        let mut reported = 0.0;
        for sweep in 0..capture.sweeps() {
            for (_, _, value) in capture.sweep(sweep) {
                reported += value;
            }
        }
        prop_assert_eq!(reported, recorded as f64);
    }

    /// Histogram classification matches a naive per-value linear scan.
    #[test]
    fn histo_matches_linear_classification(
        raw_edges in prop::collection::btree_set(0u64..10_000, 2..=9),
        values in prop::collection::vec(0u64..12_000, 0..200),
    ) {
        let edges: Vec<u64> = raw_edges.iter().copied().collect();
        let registry = Registry::with_start("p", 0).unwrap();
        let (mut poller, capture) = poller_with_capture(&registry);
        let histo = registry.histo("h", &edges).unwrap();

        let mut below = 0u64;
        let mut above = 0u64;
        let mut counts = vec![0u64; edges.len() - 1];
        for &v in &values {
            histo.record(v);
            if v < edges[0] {
                below += 1;
            } else if v >= *edges.last().unwrap() {
                above += 1;
            } else {
                let bucket = edges.iter().filter(|&&e| e <= v).count() - 1;
                counts[bucket] += 1;
            }
        }

        poller.poll_at(1);
        let reported = capture.last_values();
        prop_assert_eq!(reported["p.host.h.below"], below as f64);
        prop_assert_eq!(reported["p.host.h.above"], above as f64);
        for (j, &count) in counts.iter().enumerate() {
            let key = format!("p.host.h.{}", edges[j + 1]);
            prop_assert_eq!(reported[&key], count as f64);
        }
    }

    /// With at most 200 values the reservoir is exact: every percentile is
    /// the sorted value at `floor(p * (n - 1))`.
    #[test]
    fn dist_is_exact_below_capacity(values in prop::collection::vec(-1_000.0f64..1_000.0, 1..=200)) {
        let registry = Registry::with_start("p", 0).unwrap();
        let (mut poller, capture) = poller_with_capture(&registry);
        let dist = registry.dist("d").unwrap();

        for &v in &values {
            dist.record(v);
        }

        let mut sorted = values.clone();
        sorted.sort_unstable_by(f64::total_cmp);
        let at = |p: f64| sorted[(p * (sorted.len() - 1) as f64) as usize];

        poller.poll_at(1);
        let reported = capture.last_values();
        prop_assert_eq!(reported["p.host.d.count"], values.len() as f64);
        prop_assert_eq!(reported["p.host.d.p50"], at(0.50));
        prop_assert_eq!(reported["p.host.d.p90"], at(0.90));
        prop_assert_eq!(reported["p.host.d.p99"], at(0.99));
    }

    /// A gauge always reports the last written level.
    #[test]
    fn gauge_reports_the_last_write(levels in prop::collection::vec(-1e6f64..1e6, 1..50)) {
        let registry = Registry::with_start("p", 0).unwrap();
        let (mut poller, capture) = poller_with_capture(&registry);
        let gauge = registry.gauge("g").unwrap();

        for &level in &levels {
            gauge.set(level);
        }

        poller.poll_at(1);
        prop_assert_eq!(capture.last_values()["p.host.g"], *levels.last().unwrap());
    }

    /// Pushes never exceed the fixed capacity and pops restore exactly.
    #[test]
    fn key_builder_stays_bounded(fragments in prop::collection::vec("[a-z0-9_]{1,40}", 1..20)) {
        let mut key = KeyBuf::new();
        let mut checkpoints = vec![];

        for fragment in &fragments {
            let before = key.as_str().to_string();
            match key.push(fragment) {
                Ok(pos) => {
                    prop_assert!(key.len() <= MAX_KEY_LEN);
                    prop_assert!(key.as_str().ends_with(fragment.as_str()));
                    checkpoints.push((pos, before));
                }
                Err(_) => {
                    // Overflow leaves the buffer untouched.
                    prop_assert_eq!(key.as_str(), before.as_str());
                }
            }
        }

        for (pos, before) in checkpoints.into_iter().rev() {
            key.pop(pos);
            prop_assert_eq!(key.as_str(), before.as_str());
        }
        prop_assert!(key.is_empty());
    }
}
