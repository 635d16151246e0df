//! Breaker hot-path benchmarks
//!
//! Measures the permit check, failure recording and registry lookup paths,
//! single-threaded and under contention on one key.
//!
//! Run with: `cargo bench --bench breaker_bench -p circuit-breaker`

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use circuit_breaker::{Breaker, BreakerConfig, BreakerRegistry, MockClock};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn config() -> BreakerConfig {
    BreakerConfig::builder()
        .max_fail(5)
        .reset_timeout(Duration::from_secs(10))
        .time_unit(Duration::from_secs(60))
        .backoff_cap(Duration::from_secs(300))
        .build()
        .expect("valid bench config")
}

// ============================================================================
// Single Breaker Benchmarks
// ============================================================================

fn bench_permit(c: &mut Criterion) {
    let mut group = c.benchmark_group("breaker_permit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("closed", |b| {
        let breaker = Breaker::with_clock("bench", config(), MockClock::new()).unwrap();
        b.iter(|| black_box(breaker.permit()));
    });

    group.bench_function("open_rejecting", |b| {
        let breaker = Breaker::with_clock("bench", config(), MockClock::new()).unwrap();
        breaker.force_open();
        b.iter(|| black_box(breaker.permit()));
    });

    group.finish();
}

fn bench_record_failure(c: &mut Criterion) {
    let mut group = c.benchmark_group("breaker_record_failure");
    group.throughput(Throughput::Elements(1));

    for max_fail in [1_u32, 10, 1000] {
        group.bench_with_input(BenchmarkId::new("spread", max_fail), &max_fail, |b, &max_fail| {
            let clock = MockClock::new();
            let cfg = BreakerConfig { max_fail, ..config() };
            let breaker = Breaker::with_clock("bench", cfg, clock.clone()).unwrap();
            b.iter(|| {
                clock.advance_secs(61);
                breaker.record_failure();
            });
        });
    }

    group.finish();
}

fn bench_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("breaker_call");

    let breaker = Breaker::with_clock("bench", config(), MockClock::new()).unwrap();
    breaker.classifier().write().register_type::<io::Error>();

    group.bench_function("success", |b| {
        b.iter(|| black_box(breaker.call(|| Ok::<_, io::Error>(black_box(1)))));
    });

    group.bench_function("unclassified_error", |b| {
        b.iter(|| black_box(breaker.call(|| Err::<(), _>(std::fmt::Error))));
    });

    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_registry_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_breaker_for");

    for keys in [10_usize, 1000] {
        group.bench_with_input(BenchmarkId::new("existing", keys), &keys, |b, &keys| {
            let registry = BreakerRegistry::with_clock(config(), MockClock::new()).unwrap();
            let names: Vec<String> = (0..keys).map(|i| format!("service-{i}")).collect();
            for name in &names {
                registry.breaker_for(name);
            }
            let mut counter = 0_usize;
            b.iter(|| {
                let key = &names[counter % keys];
                black_box(registry.breaker_for(key));
                counter = counter.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_contended_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_contended_key");

    for threads in [2_usize, 8] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, &threads| {
            let registry =
                Arc::new(BreakerRegistry::with_clock(config(), MockClock::new()).unwrap());
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let registry = Arc::clone(&registry);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                let breaker = registry.breaker_for("shared");
                                let _ = black_box(breaker.permit());
                                breaker.record_success();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_permit,
    bench_record_failure,
    bench_call,
    bench_registry_lookup,
    bench_contended_key
);
criterion_main!(benches);
