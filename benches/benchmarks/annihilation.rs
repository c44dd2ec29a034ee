use criterion::{black_box, criterion_group, BenchmarkId, Criterion};
use fciqmc::annihilation::annihilate;
use fciqmc::propagation::Walker;
use fciqmc::Det;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn random_list(rng: &mut SmallRng, n: usize, n_basis: usize) -> Vec<Walker> {
    (0..n)
        .map(|_| {
            let occ: Vec<u32> = (0..n_basis as u32)
                .filter(|_| rng.gen::<f64>() < 0.25)
                .collect();
            Walker {
                det: Det::from_occ(&occ, n_basis),
                pops: [rng.gen_range(-10..=10), 0],
            }
        })
        .collect()
}

pub fn bench_annihilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Annihilation sweep");
    let mut rng = SmallRng::seed_from_u64(42);
    let n_basis = 64;

    for spawns in [1_000usize, 10_000, 100_000] {
        let mut main = random_list(&mut rng, 5_000, n_basis);
        main.sort_unstable_by(|a, b| a.det.cmp(&b.det));
        main.dedup_by(|a, b| a.det == b.det);
        let spawned_proto = random_list(&mut rng, spawns, n_basis);
        group.bench_with_input(BenchmarkId::from_parameter(spawns), &spawns, |b, _| {
            b.iter(|| {
                let mut m = main.clone();
                let mut s = spawned_proto.clone();
                let mut scratch = Vec::new();
                annihilate(&mut m, &mut s, &mut scratch);
                black_box(m.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_annihilation,);
