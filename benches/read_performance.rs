//! Performance benchmarks for confwatch.
//!
//! Measures document and snapshot reads against the store, alone and while
//! another thread keeps reloading a file.

use confwatch::core::ConfigStore;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn populated_store(files: usize) -> ConfigStore {
    let store = ConfigStore::new();
    for i in 0..files {
        let doc = json!({
            "server": {"port": 8000 + i, "host": "localhost"},
            "features": ["a", "b", "c"],
        });
        store
            .load(&format!("file_{i}.json"), doc.to_string().as_bytes())
            .unwrap();
    }
    store
}

/// Benchmark single-threaded reads
fn benchmark_read_latency(c: &mut Criterion) {
    let store = populated_store(16);

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("document", |b| {
        b.iter(|| {
            let doc = store.get("file_7.json").unwrap();
            black_box(&doc["server"]);
        });
    });
    group.bench_function("snapshot", |b| {
        b.iter(|| {
            let snapshot = store.snapshot();
            black_box(snapshot.len());
        });
    });
    group.finish();
}

/// Benchmark concurrent snapshot reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let store = Arc::new(populated_store(16));
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for _ in 0..num_threads {
                        let store = Arc::clone(&store);
                        let barrier = Arc::clone(&barrier);

                        handles.push(thread::spawn(move || {
                            barrier.wait();

                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                black_box(store.snapshot().len());
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark reads while a writer keeps reloading one file
fn benchmark_reads_during_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads_during_reload");
    group.sample_size(20);

    group.bench_function("snapshot_with_writer", |b| {
        let store = Arc::new(populated_store(16));
        let running = Arc::new(AtomicBool::new(true));

        let writer = {
            let store = Arc::clone(&store);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut i = 0u64;
                while running.load(Ordering::Relaxed) {
                    let raw = format!(r#"{{"version": {i}}}"#);
                    store.load("file_0.json", raw.as_bytes()).unwrap();
                    i += 1;
                }
            })
        };

        b.iter(|| {
            let snapshot = store.snapshot();
            black_box(snapshot.document("file_0.json"));
        });

        running.store(false, Ordering::Relaxed);
        writer.join().unwrap();
    });

    group.finish();
}

/// Benchmark the cost of a single reload
fn benchmark_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("reload");

    for files in [1, 16, 128] {
        group.bench_with_input(BenchmarkId::new("files", files), &files, |b, &files| {
            let store = populated_store(files);
            let raw = br#"{"server": {"port": 9090, "host": "0.0.0.0"}}"#;
            b.iter(|| store.load("file_0.json", black_box(raw)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_read_latency,
    benchmark_concurrent_reads,
    benchmark_reads_during_reload,
    benchmark_reload,
);

criterion_main!(benches);
