//! Throughput Benchmark for RingKV
//!
//! This benchmark measures the performance of the store, the incremental
//! hash map underneath it, the request codec, and the connection ring buffer.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use ringkv::commands::CommandHandler;
use ringkv::connection::RingBuffer;
use ringkv::protocol::{encode_request, parse_request, LEN_PREFIX, MAX_MSG};
use ringkv::storage::{str_hash, Entry, HMap, Store};

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let mut store = Store::new();

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            let value = Bytes::from("small_value");
            store.set(key, value);
            i += 1;
        });
    });

    group.bench_function("set_overwrite", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 1_000));
            store.set(key, value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let mut store = Store::new();

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let mut store = Store::new();

    // Pre-populate
    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        store.set(key, value);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                let key = Bytes::from(format!("new:{}", i));
                let value = Bytes::from("value");
                store.set(key, value);
            } else {
                // 80% reads
                let key = format!("key:{}", i % 10_000);
                black_box(store.get(key.as_bytes()));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark the hash map across resizes: fill from empty, then drain to empty.
fn bench_resize(c: &mut Criterion) {
    const KEYS: usize = 50_000;

    let entries: Vec<Entry> = (0..KEYS)
        .map(|i| Entry {
            key: Bytes::from(format!("key:{}", i)),
            value: Bytes::from_static(b"v"),
        })
        .collect();

    let mut group = c.benchmark_group("resize");
    group.throughput(Throughput::Elements(KEYS as u64));
    group.sample_size(20);

    group.bench_function("grow", |b| {
        b.iter_batched(
            || entries.clone(),
            |entries| {
                let mut map = HMap::new();
                for entry in entries {
                    map.insert(str_hash(&entry.key), entry);
                }
                map
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("shrink", |b| {
        b.iter_batched(
            || {
                let mut map = HMap::new();
                for entry in entries.iter().cloned() {
                    map.insert(str_hash(&entry.key), entry);
                }
                map
            },
            |mut map| {
                for entry in &entries {
                    black_box(map.remove(str_hash(&entry.key), &entry.key[..]));
                }
                map
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

/// Benchmark request decoding and command execution
fn bench_requests(c: &mut Criterion) {
    let set = encode_request(&["set", "user:1000", "some moderately sized value"]).unwrap();
    let get = encode_request(&["get", "user:1000"]).unwrap();

    let mut group = c.benchmark_group("requests");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_request", |b| {
        b.iter(|| black_box(parse_request(black_box(&set[LEN_PREFIX..])).unwrap()));
    });

    group.bench_function("execute_get", |b| {
        let mut handler = CommandHandler::new(Store::new());
        handler.execute(&parse_request(&set[LEN_PREFIX..]).unwrap());
        let args = parse_request(&get[LEN_PREFIX..]).unwrap();
        b.iter(|| black_box(handler.execute(&args)));
    });

    group.finish();
}

/// Benchmark ring buffer copies, including ones that wrap
fn bench_ring_buffer(c: &mut Criterion) {
    let chunk = vec![0xABu8; 3000];
    let mut out = vec![0u8; 3000];

    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Bytes(chunk.len() as u64));

    group.bench_function("write_read_wrapping", |b| {
        let mut ring = RingBuffer::new(LEN_PREFIX + MAX_MSG);
        b.iter(|| {
            ring.write(black_box(&chunk));
            ring.read(&mut out);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_resize,
    bench_requests,
    bench_ring_buffer,
);

criterion_main!(benches);
