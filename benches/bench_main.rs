use criterion::criterion_main;

mod benchmarks;

criterion_main!(
    benchmarks::excitgen::benches,
    benchmarks::annihilation::benches,
);
