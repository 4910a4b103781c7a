#![allow(dead_code)]

use gsks::reference::sum_reference;
use gsks::{Kernel, KernelKind, Operands, PointSet, Summator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Relative tolerance between the blocked engine and the oracle.
pub const TOLERANCE: f64 = 1e-9;

/// Absolute slack for sums that cancel to (nearly) zero: a few thousand ulps
/// of the O(1) terms being added.
pub const ABSOLUTE_FLOOR: f64 = 4096.0 * f64::EPSILON;

pub fn assert_close(actual: &[f64], expected: &[f64], context: &str) {
    assert_eq!(actual.len(), expected.len(), "{}: length", context);
    for (row, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        let scale = a.abs().max(e.abs());
        assert!(
            (a - e).abs() <= TOLERANCE * scale + ABSOLUTE_FLOOR,
            "{}: row {}: {} != {}",
            context,
            row,
            a,
            e
        );
    }
}

/// Randomly generated tables and index maps for one summation.
///
/// Targets lie in `[0, 1)^k / sqrt(k)` and sources in `[1, 2)^k / sqrt(k)`,
/// so the two sets never share a point and typical squared distances are
/// around one, inside the support of the compact kernels.
#[derive(Debug, Clone)]
pub struct Problem {
    pub k: usize,
    pub rhs: usize,
    pub targets: Vec<f64>,
    pub sources: Vec<f64>,
    pub target_bandwidth: Vec<f64>,
    pub source_bandwidth: Vec<f64>,
    pub weights: Vec<f64>,
    pub target_map: Vec<usize>,
    pub source_map: Vec<usize>,
    pub potentials: Vec<f64>,
}

impl Problem {
    pub fn random(seed: u64, m: usize, n: usize, k: usize, rhs: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let target_rows = m + 5;
        let source_rows = n + 5;
        let norm = 1.0 / (k.max(1) as f64).sqrt();

        let targets = (0..target_rows * k)
            .map(|_| rng.random_range(0.0..1.0) * norm)
            .collect();
        let sources = (0..source_rows * k)
            .map(|_| rng.random_range(1.0..2.0) * norm)
            .collect();
        let target_bandwidth = (0..target_rows).map(|_| rng.random_range(-1.0..-0.1)).collect();
        let source_bandwidth = (0..source_rows).map(|_| rng.random_range(-1.0..-0.1)).collect();
        let weights = (0..source_rows * rhs)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();
        let target_map = (0..m).map(|_| rng.random_range(0..target_rows)).collect();
        let source_map = (0..n).map(|_| rng.random_range(0..source_rows)).collect();
        let potentials = (0..target_rows * rhs)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect();

        Self {
            k,
            rhs,
            targets,
            sources,
            target_bandwidth,
            source_bandwidth,
            weights,
            target_map,
            source_map,
            potentials,
        }
    }

    pub fn kernel(&self, kind: KernelKind) -> Kernel<'_> {
        match kind {
            KernelKind::Gaussian => Kernel::gaussian(-0.5),
            KernelKind::GaussianVariableBandwidth => {
                Kernel::gaussian_variable_bandwidth(&self.target_bandwidth, &self.source_bandwidth)
            }
            KernelKind::Polynomial => Kernel::polynomial(1.0, 1.0, 3.0),
            KernelKind::Laplace => Kernel::laplace(),
            KernelKind::Tanh => Kernel::tanh(0.5, -0.25),
            KernelKind::Quartic => Kernel::quartic(),
            KernelKind::Multiquadratic => Kernel::multiquadratic(1.0),
            KernelKind::Epanechnikov => Kernel::epanechnikov(),
        }
    }

    pub fn operands(&self) -> Operands<'_> {
        let targets = PointSet::new(&self.targets, self.k).expect("targets");
        let sources = PointSet::new(&self.sources, self.k).expect("sources");
        Operands::new(
            targets,
            &self.target_map,
            sources,
            &self.source_map,
            &self.weights,
            self.rhs,
        )
    }

    pub fn run(&self, summator: &Summator, kind: KernelKind) -> Vec<f64> {
        let mut potentials = self.potentials.clone();
        summator
            .sum(&self.kernel(kind), &self.operands(), &mut potentials)
            .expect("blocked summation");
        potentials
    }

    pub fn run_reference(&self, kind: KernelKind) -> Vec<f64> {
        let mut potentials = self.potentials.clone();
        sum_reference(&self.kernel(kind), &self.operands(), &mut potentials)
            .expect("reference summation");
        potentials
    }

    /// Kernels defined for this problem's dimension.
    pub fn kinds(&self) -> impl Iterator<Item = KernelKind> + '_ {
        KernelKind::ALL
            .into_iter()
            .filter(move |&kind| kind != KernelKind::Laplace || self.k > 2)
    }
}
