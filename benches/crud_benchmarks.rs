use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use cow_btree::{BTree, KeySelector, MatchingStrategy};

const N: usize = 10_000;

// ─── Helper functions to generate key sequences ─────────────────────────────

fn ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).collect()
}

fn random_keys(n: usize) -> Vec<i64> {
    // Use a simple LCG for deterministic pseudo-random sequence
    let mut keys = Vec::with_capacity(n);
    let mut x: u64 = 12345;
    for _ in 0..n {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        keys.push((x >> 33) as i64);
    }
    keys
}

// ─── CRUD Benchmarks ────────────────────────────────────────────────────────

fn bench_insert(c: &mut Criterion) {
    for (name, keys) in [("ordered", ordered_keys(N)), ("random", random_keys(N))] {
        let mut group = c.benchmark_group(format!("insert_{name}"));

        group.bench_function(BenchmarkId::new("BTree", N), |b| {
            b.iter(|| {
                let mut tree = BTree::new();
                for &k in &keys {
                    tree.insert((k, k), KeySelector::Any);
                }
                tree
            });
        });

        group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
            b.iter(|| {
                let mut map = BTreeMap::new();
                for &k in &keys {
                    map.insert(k, k);
                }
                map
            });
        });

        group.finish();
    }
}

fn bench_get_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let tree: BTree<i64, i64> = keys.iter().map(|&k| (k, k)).collect();
    let bt_map: BTreeMap<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

    let mut group = c.benchmark_group("get_random");

    group.bench_function(BenchmarkId::new("BTree", N), |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for &k in &keys {
                if let Some(&v) = tree.value_of(&k, KeySelector::Any) {
                    sum = sum.wrapping_add(v);
                }
            }
            sum
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for &k in &keys {
                if let Some(&v) = bt_map.get(&k) {
                    sum = sum.wrapping_add(v);
                }
            }
            sum
        });
    });

    group.finish();
}

fn bench_remove_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let tree: BTree<i64, i64> = keys.iter().map(|&k| (k, k)).collect();
    let bt_map: BTreeMap<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

    let mut group = c.benchmark_group("remove_random");

    group.bench_function(BenchmarkId::new("BTree", N), |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                for &k in &keys {
                    tree.remove(&k, KeySelector::Any);
                }
                tree
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter_batched(
            || bt_map.clone(),
            |mut map| {
                for &k in &keys {
                    map.remove(&k);
                }
                map
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ─── Copy-on-write Benchmarks ───────────────────────────────────────────────

fn bench_snapshot_then_edit(c: &mut Criterion) {
    let keys = ordered_keys(N);
    let tree: BTree<i64, i64> = keys.iter().map(|&k| (k, k)).collect();
    let bt_map: BTreeMap<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

    let mut group = c.benchmark_group("snapshot_then_edit");

    group.bench_function(BenchmarkId::new("BTree", N), |b| {
        b.iter(|| {
            let mut copy = tree.clone();
            copy.insert((N as i64 / 2, 0), KeySelector::Any);
            copy
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut copy = bt_map.clone();
            copy.insert(N as i64 / 2, 0);
            copy
        });
    });

    group.finish();
}

fn bench_cursor_batch(c: &mut Criterion) {
    let keys = ordered_keys(N);
    let tree: BTree<i64, i64> = keys.iter().map(|&k| (k, k)).collect();

    let mut group = c.benchmark_group("batch_update");

    group.bench_function(BenchmarkId::new("BTree cursor", N), |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                tree.with_cursor_at_start(|cursor| {
                    while !cursor.is_at_end() {
                        *cursor.value_mut() += 1;
                        cursor.move_forward();
                    }
                });
                tree
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function(BenchmarkId::new("BTree offsets", N), |b| {
        b.iter_batched(
            || tree.clone(),
            |mut tree| {
                for offset in 0..tree.len() {
                    let value = *tree.element_at(offset).1;
                    tree.set_value_at(offset, value + 1);
                }
                tree
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_set_algebra(c: &mut Criterion) {
    let base: BTree<i64, i64> = ordered_keys(N).into_iter().map(|k| (k, k)).collect();
    let mut edited = base.clone();
    edited.remove(&(N as i64 / 3), KeySelector::Any);
    let interleaved: BTree<i64, i64> = ordered_keys(N).into_iter().map(|k| (k * 2 + 1, k)).collect();

    let mut group = c.benchmark_group("set_algebra");

    group.bench_function(BenchmarkId::new("union shared", N), |b| {
        b.iter(|| base.union(&edited, MatchingStrategy::Grouping));
    });

    group.bench_function(BenchmarkId::new("union interleaved", N), |b| {
        b.iter(|| base.union(&interleaved, MatchingStrategy::Grouping));
    });

    group.bench_function(BenchmarkId::new("elements_equal shared", N), |b| {
        b.iter(|| base.elements_equal(&edited));
    });

    group.finish();
}

// ─── Criterion Groups ───────────────────────────────────────────────────────

criterion_group!(crud_benches, bench_insert, bench_get_random, bench_remove_random,);

criterion_group!(sharing_benches, bench_snapshot_then_edit, bench_cursor_batch, bench_set_algebra,);

criterion_main!(crud_benches, sharing_benches,);
