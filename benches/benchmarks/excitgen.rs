use criterion::{black_box, criterion_group, BenchmarkId, Criterion};
use fciqmc::excitgen::gen_excit;
use fciqmc::lattice::LatticeSpec;
use fciqmc::system::{DetCache, System};
use rand::rngs::SmallRng;
use rand::SeedableRng;

pub fn bench_real_space_generator(c: &mut Criterion) {
    let mut group = c.benchmark_group("Real-space excitation draws");
    let mut rng = SmallRng::seed_from_u64(42);

    for sites in [4usize, 8, 16, 32] {
        let spec = LatticeSpec::chain(sites).unwrap();
        let sys = System::hubbard_real(&spec, sites / 2, sites / 2, 4.0, 1.0).unwrap();
        let mut cache = DetCache::new();
        cache.decode(&sys.reference);
        group.bench_with_input(BenchmarkId::from_parameter(sites), &sites, |b, _| {
            b.iter(|| {
                black_box(gen_excit(
                    &sys,
                    &sys.reference,
                    &cache,
                    0.0,
                    true,
                    &mut rng,
                ))
            })
        });
    }
    group.finish();
}

pub fn bench_momentum_space_generator(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(42);
    let sys = System::hubbard_k(&[4, 4], 4, 4, 4.0, 1.0).unwrap();
    let mut cache = DetCache::new();
    cache.decode(&sys.reference);
    c.bench_function("Momentum-space excitation draw 4x4", |b| {
        b.iter(|| {
            black_box(gen_excit(
                &sys,
                &sys.reference,
                &cache,
                0.0,
                true,
                &mut rng,
            ))
        })
    });
}

criterion_group!(benches, bench_real_space_generator, bench_momentum_space_generator,);
