//! Scoring and Relaxation Benchmarks
//!
//! Full two-phase scoring pass and one relaxation sweep over maps of
//! increasing size, populated through the normal selection path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::time::Duration;
use topomem_core::{AnyCell, BitVector, MapConfig, Provenance, RelaxConfig, TopoMap};

const HASH_LEN: usize = 256;

fn random_vector(rng: &mut ChaCha20Rng) -> BitVector {
    let bits: Vec<bool> = (0..HASH_LEN).map(|_| rng.gen_bool(0.1)).collect();
    BitVector::from_bools(&bits)
}

fn populated_map(side: u32, memories: usize) -> TopoMap {
    let mut map = TopoMap::new(MapConfig {
        width: side,
        height: side,
        hash_len: HASH_LEN,
        ..MapConfig::default()
    })
    .expect("valid bench config");
    let mut rng = ChaCha20Rng::seed_from_u64(0xBEEF);
    for i in 0..memories {
        let v = random_vector(&mut rng);
        map.select_and_store(&v, Provenance(i as u64), &AnyCell, &mut rng)
            .expect("matching length");
    }
    map
}

fn bench_scoring_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring_pass");
    group.measurement_time(Duration::from_secs(5));

    for side in [16u32, 32, 64] {
        let map = populated_map(side, 200);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let query = random_vector(&mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, _| {
            b.iter(|| black_box(map.score(black_box(&query)).expect("matching length")))
        });
    }
    group.finish();
}

fn bench_relaxation_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("relaxation_sweep");
    group.sample_size(20);

    let one_sweep = RelaxConfig {
        small_change_threshold: 0,
        plateau_patience: u32::MAX,
        max_iterations: 1,
    };
    for side in [16u32, 32] {
        let base = populated_map(side, 300);
        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, _| {
            b.iter_batched(
                || (base.clone(), ChaCha20Rng::seed_from_u64(2)),
                |(mut map, mut rng)| black_box(map.relax(one_sweep, &mut rng)),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scoring_pass, bench_relaxation_sweep);
criterion_main!(benches);
