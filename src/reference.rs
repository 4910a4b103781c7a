//! Unblocked double-loop summation, for differential testing.
//!
//! Takes the same inputs as [`Summator::sum`](crate::Summator::sum) and
//! validates them the same way, then evaluates every pair directly through
//! [`ResolvedKernel::evaluate`](crate::kernel::ResolvedKernel::evaluate).

use crate::error::Result;
use crate::kernel::Kernel;
use crate::planner::Operands;

pub fn sum_reference(
    kernel: &Kernel<'_>,
    operands: &Operands<'_>,
    potentials: &mut [f64],
) -> Result<()> {
    if operands.is_degenerate() {
        return Ok(());
    }
    operands.validate_shapes()?;
    let (n, k) = (operands.n(), operands.k());
    let resolved = kernel.resolve(k)?;
    operands.validate(kernel, &resolved, potentials.len())?;

    let rhs = operands.rhs;
    let targets = &operands.targets;
    let sources = &operands.sources;
    let needs_sq_norm = resolved.traits.needs_sq_norm;
    let source_bandwidth = kernel
        .bandwidth
        .filter(|_| resolved.traits.needs_bandwidth)
        .map(|bw| bw.source);

    let mut values = vec![0.0; n];
    let mut sums = vec![0.0; rhs];

    for (&a_id, &dest) in operands.target_map.iter().zip(operands.destination_map) {
        let a = targets.point(a_id);
        let a2 = if needs_sq_norm { targets.squared_norm(a_id) } else { 0.0 };

        for (value, &b_id) in values.iter_mut().zip(operands.source_map) {
            let b = sources.point(b_id);
            let mut inner = 0.0;
            for (x, y) in a.iter().zip(b) {
                inner += x * y;
            }
            let b2 = if needs_sq_norm { sources.squared_norm(b_id) } else { 0.0 };
            let h = source_bandwidth.map_or(0.0, |h| h[b_id]);
            *value = resolved.evaluate(inner, a2, b2, h);
        }

        sums.fill(0.0);
        for (value, &w_id) in values.iter().zip(operands.weight_map) {
            let w = &operands.weights[w_id * rhs..(w_id + 1) * rhs];
            for (sum, &wr) in sums.iter_mut().zip(w) {
                *sum += value * wr;
            }
        }

        for (u, sum) in potentials[dest * rhs..(dest + 1) * rhs].iter_mut().zip(&sums) {
            *u += sum;
        }
    }

    Ok(())
}
