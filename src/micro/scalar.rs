//! Portable micro-kernel.
//!
//! Sums every inner product in coordinate order starting from zero and every
//! potential in source order, which is the order of a plain double loop. On a
//! single coordinate chunk and a single source block the blocked result is
//! therefore bit-identical to the unblocked one.

use std::marker::PhantomData;

use super::{contract, Backend, FusedTile, MicroKernel, TileShape};
use crate::kernel::{KernelKind, Transform};
use crate::MAX_TILE;

pub(crate) struct ScalarBackend;

impl Backend for ScalarBackend {
    fn build<T: Transform>() -> Box<dyn MicroKernel> {
        Box::new(ScalarKernel::<T>::new())
    }
}

pub struct ScalarKernel<T> {
    _transform: PhantomData<T>,
}

impl<T: Transform> ScalarKernel<T> {
    pub fn new() -> Self {
        Self {
            _transform: PhantomData,
        }
    }
}

impl<T: Transform> Default for ScalarKernel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn rank_k_add(shape: &TileShape, a: &[f64], b: &[f64], c: &mut [f64]) {
    let TileShape { mr, nr, depth, .. } = *shape;
    for p in 0..depth {
        let a_row = &a[p * mr..(p + 1) * mr];
        let b_row = &b[p * nr..(p + 1) * nr];
        for (j, &bj) in b_row.iter().enumerate() {
            let column = &mut c[j * mr..(j + 1) * mr];
            for (cij, &ai) in column.iter_mut().zip(a_row) {
                *cij += ai * bj;
            }
        }
    }
}

impl<T: Transform> MicroKernel for ScalarKernel<T> {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn kind(&self) -> KernelKind {
        T::KIND
    }

    fn rank_k(
        &self,
        shape: &TileShape,
        a: &[f64],
        b: &[f64],
        _next_b: &[f64],
        c: &mut [f64],
        accumulate: bool,
    ) {
        let c = &mut c[..shape.area()];
        if !accumulate {
            c.fill(0.0);
        }
        rank_k_add(shape, a, b, c);
    }

    fn fused(&self, shape: &TileShape, tile: &FusedTile<'_>, u: &mut [f64]) {
        let mut c = [0.0f64; MAX_TILE];
        let c = &mut c[..shape.area()];
        if let Some(partial) = tile.partial {
            c.copy_from_slice(&partial[..shape.area()]);
        }
        rank_k_add(shape, tile.a, tile.b, c);
        contract::<T>(shape, tile, c, u);
    }
}
