use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kuba_storage_read::engine::stubs::{InMemoryShard, InMemoryShardGroup};
use kuba_storage_read::engine::traits::ReadContext;
use kuba_storage_read::query::{Expr, IndexSeriesCursor, Predicate, SeriesCursor};
use kuba_storage_read::types::Tags;

fn create_shards(hosts: usize) -> InMemoryShardGroup {
    let shards: Vec<InMemoryShard> = (0..4).map(InMemoryShard::new).collect();
    for i in 0..hosts {
        let tags = Tags::from_pairs([
            ("host", format!("host-{:05}", i)),
            ("region", "us-east".to_string()),
        ]);
        shards[i % 4].write("cpu", tags.clone(), &["usage_idle", "usage_system", "usage_user"]);
        shards[(i + 1) % 4].write("mem", tags, &["free", "used"]);
    }
    InMemoryShardGroup::new(shards)
}

fn drain(shards: &InMemoryShardGroup, predicate: &Predicate) -> usize {
    let mut cursor = IndexSeriesCursor::new(&ReadContext::new(), predicate, shards)
        .unwrap()
        .unwrap();
    let mut rows = 0;
    while let Some(row) = cursor.next() {
        black_box(row);
        rows += 1;
    }
    rows
}

fn bench_metadata_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_metadata_path");
    let predicate = Predicate::new(Expr::measurement().equal(Expr::string("cpu")));

    for size in [100, 1000, 10000].iter() {
        let shards = create_shards(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(drain(&shards, &predicate)));
        });
    }

    group.finish();
}

fn bench_scan_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_scan_path");
    let predicate = Predicate::new(
        Expr::field_key()
            .equal(Expr::string("usage_idle"))
            .or(Expr::field_key().equal(Expr::string("used")))
            .and(Expr::field_value().greater_than(Expr::number(0.5))),
    );

    for size in [100, 1000, 10000].iter() {
        let shards = create_shards(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(drain(&shards, &predicate)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_metadata_path, bench_scan_path);
criterion_main!(benches);
