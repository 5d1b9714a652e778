//! Floe throughput benchmarks.
//!
//! - Streaming decode of arrays and JSON Lines
//! - Gzip decompression plus decode
//! - Full in-memory runs at different worker counts

use std::io::BufReader;
use std::ops::ControlFlow;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};


use floe::sink::{MemoryConnector, MemoryStore};
use floe::source::{CompressionCodec, GzipCodec, InputFormat, StreamDecoder};
use floe::{IngestionRunner, RunSettings, Target};

/// Decode-only throughput, no writes.
fn decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [1_000, 10_000, 100_000] {
        let array = bench_utils::generate_array(size);
        let lines = bench_utils::generate_lines(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("array", size), &array, |b, data| {
            b.iter(|| {
                StreamDecoder::new(data.as_bytes(), InputFormat::Array)
                    .decode(|_| ControlFlow::Continue(()))
                    .unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("lines", size), &lines, |b, data| {
            b.iter(|| {
                StreamDecoder::new(data.as_bytes(), InputFormat::Lines)
                    .decode(|_| ControlFlow::Continue(()))
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Gzip decompression + array decode.
fn decompress_and_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress_and_decode");

    for size in [10_000, 100_000] {
        let compressed = bench_utils::generate_gzip_array(size);

        group.throughput(Throughput::Elements(size as u64));
        group.sample_size(10);

        group.bench_with_input(BenchmarkId::new("gzip_array", size), &compressed, |b, data| {
            b.iter(|| {
                let reader = GzipCodec
                    .wrap(Box::new(BufReader::new(std::io::Cursor::new(data.clone()))))
                    .unwrap();
                StreamDecoder::new(reader, InputFormat::Array)
                    .decode(|_| ControlFlow::Continue(()))
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// End-to-end run into an in-memory store.
fn memory_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_run");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let size = 20_000;
    let file = bench_utils::generate_array_file(size);

    group.throughput(Throughput::Elements(size as u64));
    group.sample_size(10);

    for workers in [1, 8, 64] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.to_async(&runtime).iter(|| async {
                let target = Target {
                    namespace: "bench".to_string(),
                    database: "bench".to_string(),
                    table: "papers".to_string(),
                };
                let mut settings = RunSettings::new("bench", file.path(), "memory://", target);
                settings.pool.workers = workers;

                let connector = Arc::new(MemoryConnector::new(MemoryStore::new()));
                IngestionRunner::new(settings, connector).run().await.unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, decoding, decompress_and_decode, memory_run);
criterion_main!(benches);
