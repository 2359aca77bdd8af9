//! Commit and recovery benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nestdb_bench::{bench_doc, random_values};
use nestdb_core::{Config, Database};
use tempfile::TempDir;

/// Benchmark commits of list appends, in memory and on disk.
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for batch in [1, 100].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("memory", batch), batch, |b, &batch| {
            let db = Database::open_in_memory().unwrap();
            let owner = {
                let doc = bench_doc(&db).unwrap();
                doc.txn.commit().unwrap();
                doc.doc.link()
            };
            let values = random_values(batch);
            b.iter(|| {
                let txn = db.begin_write().unwrap();
                let obj = txn.get_object(owner).unwrap();
                let items = obj.get_list(obj.col_key("items").unwrap()).unwrap();
                for value in &values {
                    items.add(black_box(value.clone())).unwrap();
                }
                txn.commit().unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("file", batch), batch, |b, &batch| {
            let dir = TempDir::new().unwrap();
            let db = Database::open_with_config(dir.path(), Config::default().sync_on_commit(false))
                .unwrap();
            let owner = {
                let doc = bench_doc(&db).unwrap();
                doc.txn.commit().unwrap();
                doc.doc.link()
            };
            let values = random_values(batch);
            b.iter(|| {
                let txn = db.begin_write().unwrap();
                let obj = txn.get_object(owner).unwrap();
                let items = obj.get_list(obj.col_key("items").unwrap()).unwrap();
                for value in &values {
                    items.add(black_box(value.clone())).unwrap();
                }
                txn.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reopening a database with many committed versions.
fn bench_recovery(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    {
        let db = Database::open_with_config(&path, Config::default().sync_on_commit(false)).unwrap();
        let owner = {
            let doc = bench_doc(&db).unwrap();
            doc.txn.commit().unwrap();
            doc.doc.link()
        };
        for value in random_values(200) {
            let txn = db.begin_write().unwrap();
            let obj = txn.get_object(owner).unwrap();
            obj.get_list(obj.col_key("items").unwrap()).unwrap().add(value).unwrap();
            txn.commit().unwrap();
        }
    }

    c.bench_function("recovery_200_commits", |b| {
        b.iter(|| black_box(Database::open(&path).unwrap().version()));
    });
}

criterion_group!(benches, bench_commit, bench_recovery);
criterion_main!(benches);
