//! Kernel summation throughput.
//!
//! # Usage:
//! ```bash
//! # Run every group
//! cargo bench --bench summation
//!
//! # Compare blocked and unblocked on one kernel
//! cargo bench --bench summation -- gaussian
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gsks::reference::sum_reference;
use gsks::{Kernel, Operands, PointSet, SummationConfig, Summator};
use rand::prelude::*;

struct Tables {
    k: usize,
    targets: Vec<f64>,
    sources: Vec<f64>,
    weights: Vec<f64>,
    target_map: Vec<usize>,
    source_map: Vec<usize>,
}

fn tables(m: usize, n: usize, k: usize, rng: &mut StdRng) -> Tables {
    let norm = 1.0 / (k as f64).sqrt();
    Tables {
        k,
        targets: (0..m * k).map(|_| rng.random_range(0.0..1.0) * norm).collect(),
        sources: (0..n * k).map(|_| rng.random_range(1.0..2.0) * norm).collect(),
        weights: (0..n).map(|_| rng.random_range(-1.0..1.0)).collect(),
        // scattered maps, as produced by tree orderings
        target_map: (0..m).map(|i| (i * 7919) % m).collect(),
        source_map: (0..n).map(|j| (j * 104_729) % n).collect(),
    }
}

impl Tables {
    fn operands(&self) -> Operands<'_> {
        Operands::new(
            PointSet::new(&self.targets, self.k).unwrap(),
            &self.target_map,
            PointSet::new(&self.sources, self.k).unwrap(),
            &self.source_map,
            &self.weights,
            1,
        )
    }
}

fn bench_gaussian(c: &mut Criterion) {
    let sizes = [(256, 256, 3), (1024, 1024, 3), (1024, 1024, 64), (512, 512, 300)];

    for (m, n, k) in sizes {
        let mut group = c.benchmark_group(format!("gaussian_{}x{}x{}", m, n, k));
        group.sample_size(20);
        group.throughput(Throughput::Elements((m * n) as u64));

        let mut rng = StdRng::seed_from_u64(42);
        let data = tables(m, n, k, &mut rng);
        let operands = data.operands();
        let kernel = Kernel::gaussian(-0.5);
        let mut potentials = vec![0.0; m];

        for threads in [1, 4] {
            let summator = Summator::new(SummationConfig::default().with_threads(threads)).unwrap();
            group.bench_with_input(BenchmarkId::new("blocked", threads), &threads, |b, _| {
                b.iter(|| {
                    summator
                        .sum(black_box(&kernel), black_box(&operands), &mut potentials)
                        .unwrap()
                })
            });
        }

        group.bench_function("reference", |b| {
            b.iter(|| sum_reference(black_box(&kernel), black_box(&operands), &mut potentials).unwrap())
        });

        group.finish();
    }
}

fn bench_kernels(c: &mut Criterion) {
    let (m, n, k) = (1024, 1024, 16);
    let mut rng = StdRng::seed_from_u64(7);
    let data = tables(m, n, k, &mut rng);
    let operands = data.operands();
    let summator = Summator::new(SummationConfig::default()).unwrap();
    let mut potentials = vec![0.0; m];

    let mut group = c.benchmark_group("kernels");
    group.sample_size(20);
    group.throughput(Throughput::Elements((m * n) as u64));

    let kernels = [
        Kernel::gaussian(-0.5),
        Kernel::polynomial(1.0, 1.0, 2.0),
        Kernel::polynomial(1.0, 1.0, 3.0),
        Kernel::laplace(),
        Kernel::tanh(0.5, -0.25),
        Kernel::quartic(),
        Kernel::multiquadratic(1.0),
        Kernel::epanechnikov(),
    ];
    for kernel in &kernels {
        let label = format!("{}_{}", kernel.kind, kernel.power);
        group.bench_function(label, |b| {
            b.iter(|| summator.sum(black_box(kernel), &operands, &mut potentials).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gaussian, bench_kernels);
criterion_main!(benches);
