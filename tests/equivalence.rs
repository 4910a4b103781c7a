//! Blocked engine vs. the unblocked oracle.

mod common;

use common::{assert_close, Problem};
use gsks::{Blocking, KernelKind, SummationConfig, Summator, KC, MR, NR};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn summator(threads: usize, blocking: Blocking) -> Summator {
    Summator::new(
        SummationConfig::default()
            .with_threads(threads)
            .with_blocking(blocking),
    )
    .expect("valid configuration")
}

const SMALL: Blocking = Blocking {
    mr: 4,
    nr: 2,
    kc: 3,
    mc: 8,
    nc: 6,
};

#[test]
fn every_kernel_matches_reference_around_tile_edges() {
    let engine = summator(1, Blocking::default());
    let sizes = [1, MR - 1, MR, MR + 1, NR + 1];
    let dims = [1, 3, 4, 5];

    for (seed, &m) in sizes.iter().enumerate() {
        for &n in &sizes {
            for &k in &dims {
                let problem = Problem::random(seed as u64 * 31 + n as u64, m, n, k, 1);
                for kind in problem.kinds() {
                    let context = format!("{} m={} n={} k={}", kind, m, n, k);
                    assert_close(
                        &problem.run(&engine, kind),
                        &problem.run_reference(kind),
                        &context,
                    );
                }
            }
        }
    }
}

#[test]
fn every_kernel_matches_reference_over_several_blocks_and_chunks() {
    // 5 target blocks, 6 source blocks, 3 coordinate chunks
    let engine = summator(3, SMALL);
    let problem = Problem::random(11, 37, 33, 7, 2);

    for kind in problem.kinds() {
        assert_close(
            &problem.run(&engine, kind),
            &problem.run_reference(kind),
            kind.name(),
        );
    }
}

#[test]
fn default_blocking_multi_pass_and_multiple_source_blocks() {
    let engine = summator(2, Blocking::default());

    let deep = Problem::random(3, 20, 13, KC + 44, 1);
    for kind in deep.kinds() {
        assert_close(
            &deep.run(&engine, kind),
            &deep.run_reference(kind),
            &format!("{} k={}", kind, deep.k),
        );
    }

    let wide = Problem::random(5, 200, 1100, 3, 3);
    for kind in [KernelKind::Gaussian, KernelKind::Laplace, KernelKind::Tanh] {
        assert_close(
            &wide.run(&engine, kind),
            &wide.run_reference(kind),
            &format!("{} n={}", kind, wide.source_map.len()),
        );
    }
}

#[test]
fn blocking_does_not_change_results() {
    let problem = Problem::random(17, 45, 29, 9, 2);
    let blockings = [
        Blocking::default(),
        SMALL,
        Blocking {
            mr: 8,
            nr: 3,
            kc: 4,
            mc: 16,
            nc: 9,
        },
        Blocking {
            mr: 1,
            nr: 1,
            kc: 1,
            mc: 1,
            nc: 1,
        },
    ];

    for kind in problem.kinds() {
        let baseline = problem.run(&summator(1, blockings[0]), kind);
        for blocking in &blockings[1..] {
            let result = problem.run(&summator(2, *blocking), kind);
            assert_close(&result, &baseline, &format!("{} {:?}", kind, blocking));
        }
    }
}

#[test]
fn thread_count_does_not_change_results() {
    let problem = Problem::random(23, 90, 40, 6, 1);
    let baseline = problem.run(&summator(1, SMALL), KernelKind::Gaussian);
    for threads in 2..=5 {
        let result = problem.run(&summator(threads, SMALL), KernelKind::Gaussian);
        assert_close(&result, &baseline, &format!("threads={}", threads));
    }
}

#[test]
fn duplicate_destinations_accumulate_across_blocks() {
    let mut problem = Problem::random(29, 40, 10, 2, 1);
    // every target writes to one of three rows, across all target blocks
    problem.target_map.iter_mut().for_each(|id| *id %= 3);
    let engine = summator(4, SMALL);

    for kind in [KernelKind::Gaussian, KernelKind::Multiquadratic] {
        assert_close(
            &problem.run(&engine, kind),
            &problem.run_reference(kind),
            kind.name(),
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_shapes_match_reference(
        m in 1..40usize,
        n in 1..40usize,
        k in 1..10usize,
        rhs in 1..4usize,
        tag in 0..8u32,
        seed in any::<u64>(),
    ) {
        let kind = KernelKind::from_tag(tag).unwrap();
        prop_assume!(kind != KernelKind::Laplace || k > 2);

        let problem = Problem::random(seed, m, n, k, rhs);
        let engine = summator(2, SMALL);
        assert_close(&problem.run(&engine, kind), &problem.run_reference(kind), kind.name());
    }

    #[test]
    fn permuting_maps_permutes_rows(
        m in 1..30usize,
        n in 1..30usize,
        k in 1..6usize,
        seed in any::<u64>(),
    ) {
        let mut problem = Problem::random(seed, m, n, k, 1);
        // distinct rows so every target owns its destination
        problem.target_map = (0..m).collect();
        let engine = summator(2, SMALL);
        let base = problem.run(&engine, KernelKind::Gaussian);

        let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9);
        let mut permuted = problem.clone();
        permuted.target_map.shuffle(&mut rng);
        permuted.source_map.shuffle(&mut rng);
        let result = permuted.run(&engine, KernelKind::Gaussian);

        // rows follow their targets; source order only reassociates the sums
        assert_close(&result, &base, "permuted maps");
    }
}
