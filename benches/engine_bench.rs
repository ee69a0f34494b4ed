use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use kvcache::{KvCache, KvServer, KvsEngine};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn keys(n: usize) -> Vec<String> {
    let mut rng = SmallRng::seed_from_u64(1);
    (0..n).map(|_| format!("key{}", rng.gen::<u32>())).collect()
}

fn cache_put(c: &mut Criterion) {
    let keys = keys(1000);
    c.bench_function("cache_put_with_eviction", |b| {
        b.iter_batched(
            || KvCache::new(16, 8),
            |cache| {
                for key in &keys {
                    cache.lock_for(key).put(key.clone(), key.clone());
                }
                cache
            },
            BatchSize::SmallInput,
        )
    });
}

fn server_get(c: &mut Criterion) {
    let keys = keys(1000);
    let mut group = c.benchmark_group("server_get");
    for &(sets, capacity) in &[(100, 10), (10, 4)] {
        let server = KvServer::new(sets, capacity);
        for key in &keys {
            server.put(key.clone(), "value".to_string()).unwrap();
        }
        group.bench_function(format!("{}x{}", sets, capacity), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(server.get(key).unwrap());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, cache_put, server_get);
criterion_main!(benches);
