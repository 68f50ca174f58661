//! Performance benchmarks for the sync engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rootcast::{path, EngineConfig, SyncEngine, Value};
use serde_json::json;

/// Benchmark fan-out of one field update to N subscribers
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for clients in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("clients", clients), &clients, |b, &n| {
            let config = EngineConfig {
                client_buffer: 1_000_000,
                ..Default::default()
            };
            let (engine, transport) = SyncEngine::in_process(config);
            engine
                .set(&path!["doc"], Value::from(json!({"count": 0})))
                .unwrap();

            let handles: Vec<_> = (0..n).map(|_| transport.connect()).collect();
            for h in &handles {
                engine.link(h.id, "doc").unwrap();
            }

            let mut i = 0i64;
            b.iter(|| {
                i += 1;
                engine.set(&path!["doc", "count"], black_box(i)).unwrap();
                for h in &handles {
                    h.drain();
                }
            });
        });
    }

    group.finish();
}

/// Benchmark resnapshot cost of sorting sequences of varying length
fn bench_sort_resnapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_resnapshot");

    for len in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("len", len), &len, |b, &len| {
            let (engine, transport) = SyncEngine::in_process(EngineConfig::default());
            let items: Vec<Value> = (0..len).rev().map(|i| Value::from(i as i64)).collect();
            engine.set(&path!["list"], Value::Array(items)).unwrap();

            let client = transport.connect();
            engine.link(client.id, "list").unwrap();

            b.iter(|| {
                engine.reverse(&path!["list"]).unwrap();
                black_box(client.drain());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_sort_resnapshot);
criterion_main!(benches);
