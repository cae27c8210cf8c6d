//! Storage engine throughput benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use memora::storage::DataStore;
use std::sync::Arc;

fn bench_set(c: &mut Criterion) {
    let store = Arc::new(DataStore::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, Bytes::from("small_value"), None);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024));
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.set(key, value.clone(), None);
            i += 1;
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let store = Arc::new(DataStore::new());

    for i in 0..100_000 {
        store.set(
            Bytes::from(format!("key:{}", i)),
            Bytes::from(format!("value:{}", i)),
            None,
        );
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.finish();
}

fn bench_incr(c: &mut Criterion) {
    let store = Arc::new(DataStore::new());

    let mut group = c.benchmark_group("incr");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_counter", |b| {
        let key = Bytes::from("counter");
        b.iter(|| {
            black_box(store.incr(&key).unwrap());
        });
    });

    group.bench_function("multiple_counters", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("counter:{}", i % 1000));
            black_box(store.incr(&key).unwrap());
            i += 1;
        });
    });

    group.finish();
}

fn bench_keys(c: &mut Criterion) {
    let store = Arc::new(DataStore::new());

    for i in 0..1_000 {
        store.set(Bytes::from(format!("user:{}", i)), Bytes::from("user_data"), None);
        store.set(
            Bytes::from(format!("session:{}", i)),
            Bytes::from("session_data"),
            None,
        );
    }

    let mut group = c.benchmark_group("keys");

    group.bench_function("keys_pattern", |b| {
        b.iter(|| {
            black_box(store.keys(b"user:*"));
        });
    });

    group.bench_function("keys_all", |b| {
        b.iter(|| {
            black_box(store.keys(b"*"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_incr, bench_keys);
criterion_main!(benches);
