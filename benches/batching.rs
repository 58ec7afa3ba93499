use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use newsprep::{BackedBatches, BackedStore, EmbeddedBatches, PoolConfig, ResidentTable, WorkerPool};
use tempfile::TempDir;

const RECORDS: usize = 2_000;
const VOCAB: usize = 5_000;
const DIM: usize = 100;
const BATCH: usize = 64;
const MAX_WORDS: usize = 300;

fn token(i: usize) -> String {
    format!("tok{i}")
}

fn write_split(path: &Path) {
    let mut body = String::new();
    for i in 0..RECORDS {
        let content: Vec<String> = (0..MAX_WORDS)
            .map(|j| format!("\"{}\"", token((i * 31 + j * 7) % VOCAB)))
            .collect();
        let _ = writeln!(body, "{{\"id\":{i},\"content\":[{}],\"label\":{}}}", content.join(","), i % 2);
    }
    fs::write(path, body).expect("write split");
}

fn vectors() -> impl Iterator<Item = (String, Vec<f32>)> {
    (0..VOCAB).map(|i| (token(i), vec![i as f32 / VOCAB as f32; DIM]))
}

fn bench_batching(c: &mut Criterion) {
    let dir = TempDir::new().expect("tempdir");
    let split = dir.path().join("train.jsonl");
    write_split(&split);

    let table = ResidentTable::from_entries(DIM, vectors()).expect("table");
    let store = BackedStore::build(dir.path().join("vectors.redb"), DIM, vectors()).expect("store");
    let batches_per_pass = RECORDS / BATCH;

    let mut group = c.benchmark_group("batch_pass");
    group.sample_size(10);
    group.throughput(Throughput::Elements((batches_per_pass * BATCH) as u64));

    group.bench_function("resident", |b| {
        b.iter(|| {
            let batches = EmbeddedBatches::new(&split, &table, BATCH, MAX_WORDS).expect("open");
            for batch in batches.take(batches_per_pass) {
                black_box(batch.expect("batch"));
            }
        })
    });

    for workers in [1, 4] {
        group.bench_function(format!("backed_workers_{workers}"), |b| {
            b.iter(|| {
                let batches = BackedBatches::new(&split, store.clone(), BATCH, MAX_WORDS)
                    .expect("open")
                    .with_workers(workers);
                for batch in batches.take(batches_per_pass) {
                    black_box(batch.expect("batch"));
                }
            })
        });
    }
    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_pool");
    for chunk in [10, 1000] {
        let config = PoolConfig::default().with_chunk_size(chunk);
        group.bench_function(format!("chunk_{chunk}"), |b| {
            b.iter(|| {
                let stream = WorkerPool::run(
                    0..100_000u64,
                    &config,
                    |_| Ok::<_, std::convert::Infallible>(()),
                    |_: &mut (), n: u64| n.wrapping_mul(0x9E37_79B9),
                )
                .expect("pool");
                black_box(stream.map(|r| r.expect("item")).fold(0u64, u64::wrapping_add));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_batching, bench_pool);
criterion_main!(benches);
