/// Profiler friendly single-locality benchmark of the distributed engine.

use criterion::{criterion_group, criterion_main, Criterion};

use dist_fft2d::{CommScheme, CommunicatorRegistry, Config, Engine, PlanQuality, RowTile};

fn build_engine(nx: usize, ny: usize) -> Engine {
    let cy = ny / 2 + 1;
    let rows = vec![vec![0.0; 2 * cy]; nx];
    let tile = RowTile::new(rows, ny).unwrap();
    let registry = CommunicatorRegistry::new(1);
    let config = Config::new(1, 0, CommScheme::AllToAll, PlanQuality::Estimate).with_num_threads(4);
    Engine::initialize(tile, nx, config, &registry).unwrap()
}

fn my_benchmark(c: &mut Criterion) {
    let mut engine = build_engine(256, 256);
    c.bench_function("execute_single_locality_256x256", |b| {
        b.iter(|| engine.execute().unwrap())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
