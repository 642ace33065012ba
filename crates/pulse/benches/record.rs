use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulse::{NullBackend, Poller, PollerConfig, Registry};
use std::thread;
use std::time::Duration;

const OPS: u64 = 1_000_000;

fn bench_record_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");
    group.throughput(Throughput::Elements(OPS));

    let registry = Registry::with_start("bench", 0).unwrap();
    let counter = registry.counter("counter").unwrap();
    let gauge = registry.gauge("gauge").unwrap();
    let dist = registry.dist("dist").unwrap();
    let histo = registry.histo("histo", &[10, 100, 1_000, 10_000]).unwrap();
    let quantile = registry.quantile("quantile", 0.9, 100.0, 1.0).unwrap();

    group.bench_function("counter_inc", |b| {
        b.iter(|| {
            for i in 0..OPS {
                counter.inc(black_box(i as i64 & 1));
            }
        });
    });

    group.bench_function("gauge_set", |b| {
        b.iter(|| {
            for i in 0..OPS {
                gauge.set(black_box(i as f64));
            }
        });
    });

    group.bench_function("dist_record", |b| {
        b.iter(|| {
            for i in 0..OPS {
                dist.record(black_box(i as f64));
            }
        });
    });

    group.bench_function("histo_record", |b| {
        b.iter(|| {
            for i in 0..OPS {
                histo.record(black_box(i % 20_000));
            }
        });
    });

    group.bench_function("quantile_update", |b| {
        b.iter(|| {
            for i in 0..OPS {
                quantile.update(black_box((i % 200) as f64));
            }
        });
    });

    group.finish();
}

fn bench_contended_counter(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");

    for num_threads in [2, 4, 8] {
        let total = OPS * num_threads as u64;
        // Aggregate throughput across all threads; per-thread averages of
        // averages understate tail contention.
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}T_one_cell", num_threads)),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let registry = Registry::with_start("bench", 0).unwrap();
                    let counter = registry.counter("hot").unwrap();

                    let mut handles = vec![];
                    for _ in 0..n {
                        let counter = counter.clone();
                        handles.push(thread::spawn(move || {
                            for _ in 0..OPS {
                                counter.inc(1);
                            }
                        }));
                    }
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_poll_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll");

    for num_cells in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(num_cells as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_counters", num_cells)),
            &num_cells,
            |b, &n| {
                let registry = Registry::with_start("bench", 0).unwrap();
                let mut counters = vec![];
                for i in 0..n {
                    counters.push(registry.counter(&format!("cell_{i}")).unwrap());
                }
                let mut poller = Poller::with_config(
                    &registry,
                    PollerConfig {
                        grace: Duration::ZERO,
                    },
                );
                poller.set_host("bench-host").unwrap();
                poller.add_backend(Box::new(NullBackend));

                let mut ts = 1;
                b.iter(|| {
                    for counter in &counters {
                        counter.inc(1);
                    }
                    poller.poll_at(black_box(ts));
                    ts += 1;
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_record_path, bench_contended_counter, bench_poll_sweep);
criterion_main!(benches);
