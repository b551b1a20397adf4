use core::hash::BuildHasherDefault;
use core::hint::black_box;

use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use fch_hash::DefaultSeededHash;
use fch_hash::HashMap as FchHashMap;
use fch_hash::MetaHashMap;
use fch_hash::StandardKeys;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use siphasher::sip::SipHasher;

type SipState = BuildHasherDefault<SipHasher>;

const SIZES: &[usize] = &[
    ((1 << 10) as f32 * 0.7) as usize,
    ((1 << 15) as f32 * 0.7) as usize,
    ((1 << 19) as f32 * 0.7) as usize,
];

fn keys(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(count);
    let mut seen = std::collections::HashSet::with_capacity(count);
    while out.len() < count {
        let key: u64 = rng.random();
        if seen.insert(key) {
            out.push(key);
        }
    }
    out
}

fn fch_map(keys: &[u64]) -> FchHashMap<u64, u64> {
    let mut map = FchHashMap::with_capacity(keys.len());
    for &key in keys {
        map.insert(key, key.wrapping_mul(3));
    }
    map
}

fn sip_map(keys: &[u64]) -> hashbrown::HashMap<u64, u64, SipState> {
    let mut map =
        hashbrown::HashMap::with_capacity_and_hasher(keys.len(), SipState::default());
    for &key in keys {
        map.insert(key, key.wrapping_mul(3));
    }
    map
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &size in SIZES {
        let keys = keys(size, 1);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("fch_hash/{size}"), |b| {
            b.iter(|| black_box(fch_map(&keys)))
        });
        group.bench_function(format!("hashbrown_sip/{size}"), |b| {
            b.iter(|| black_box(sip_map(&keys)))
        });
    }
    group.finish();
}

fn bench_lookup_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_hit");
    for &size in SIZES {
        let keys = keys(size, 2);
        let fch = fch_map(&keys);
        let sip = sip_map(&keys);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("fch_hash/{size}"), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for key in &keys {
                    sum = sum.wrapping_add(*fch.get(black_box(key)).unwrap());
                }
                black_box(sum)
            })
        });
        group.bench_function(format!("fch_hash_meta/{size}"), |b| {
            let mut meta: MetaHashMap<u64, u64, DefaultSeededHash, u32, StandardKeys<u64>> =
                MetaHashMap::<u64, u64>::with_hasher(DefaultSeededHash::default());
            meta.reserve(size);
            for &key in &keys {
                meta.insert(key, key.wrapping_mul(3));
            }
            b.iter(|| {
                let mut sum = 0u64;
                for key in &keys {
                    sum = sum.wrapping_add(*meta.get(black_box(key)).unwrap());
                }
                black_box(sum)
            })
        });
        group.bench_function(format!("hashbrown_sip/{size}"), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for key in &keys {
                    sum = sum.wrapping_add(*sip.get(black_box(key)).unwrap());
                }
                black_box(sum)
            })
        });
    }
    group.finish();
}

fn bench_lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_miss");
    for &size in SIZES {
        let present = keys(size, 3);
        let absent = keys(size, 0xABadCafe);
        let fch = fch_map(&present);
        let sip = sip_map(&present);
        let mut meta: MetaHashMap<u64, u64> =
            MetaHashMap::<u64, u64>::with_hasher(DefaultSeededHash::default());
        meta.reserve(size);
        for &key in &present {
            meta.insert(key, key);
        }
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("fch_hash/{size}"), |b| {
            b.iter(|| {
                let mut found = 0usize;
                for key in &absent {
                    found += usize::from(fch.contains_key(black_box(key)));
                }
                black_box(found)
            })
        });
        group.bench_function(format!("fch_hash_meta/{size}"), |b| {
            b.iter(|| {
                let mut found = 0usize;
                for key in &absent {
                    found += usize::from(meta.contains_key(black_box(key)));
                }
                black_box(found)
            })
        });
        group.bench_function(format!("hashbrown_sip/{size}"), |b| {
            b.iter(|| {
                let mut found = 0usize;
                for key in &absent {
                    found += usize::from(sip.contains_key(black_box(key)));
                }
                black_box(found)
            })
        });
    }
    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");
    for &size in SIZES {
        let keys = keys(size, 4);
        let fch = fch_map(&keys);
        let sip = sip_map(&keys);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("fch_hash/{size}"), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (key, value) in fch.iter() {
                    sum = sum.wrapping_add(*key ^ *value);
                }
                black_box(sum)
            })
        });
        group.bench_function(format!("hashbrown_sip/{size}"), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (key, value) in sip.iter() {
                    sum = sum.wrapping_add(*key ^ *value);
                }
                black_box(sum)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup_hit,
    bench_lookup_miss,
    bench_iterate
);
criterion_main!(benches);
