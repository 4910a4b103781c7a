//! AVX2 + FMA micro-kernel.
//!
//! Keeps four targets of one source column in a 256-bit register across the
//! whole coordinate chunk, so `mr` must be a multiple of [`LANES`]. The kernel
//! transform and the weight contraction reuse the shared scalar epilogue.
//!
//! FMA rounds each `a * b + c` once, so results differ from the portable
//! kernel in the last bits.

use std::arch::x86_64::*;
use std::marker::PhantomData;

use super::{contract, Backend, FusedTile, MicroKernel, TileShape};
use crate::config::Blocking;
use crate::kernel::{KernelKind, Transform};
use crate::MAX_TILE;

/// f64 lanes per 256-bit register.
pub const LANES: usize = 4;

/// Whether this CPU and tiling can run the AVX2 kernels.
pub fn is_supported(blocking: &Blocking) -> bool {
    blocking.mr % LANES == 0
        && is_x86_feature_detected!("avx2")
        && is_x86_feature_detected!("fma")
}

pub(crate) struct Avx2Backend;

impl Backend for Avx2Backend {
    fn build<T: Transform>() -> Box<dyn MicroKernel> {
        Box::new(Avx2Kernel::<T> {
            _transform: PhantomData,
        })
    }
}

pub struct Avx2Kernel<T> {
    _transform: PhantomData<T>,
}

/// `c += A * B` for one tile.
///
/// # Safety
/// The CPU must support AVX2 and FMA, `shape.mr % LANES == 0`, and the slices
/// must hold at least `depth * mr`, `depth * nr` and `mr * nr` elements.
#[target_feature(enable = "avx2,fma")]
unsafe fn rank_k_fma(shape: &TileShape, a: &[f64], b: &[f64], c: &mut [f64]) {
    let TileShape { mr, nr, depth, .. } = *shape;
    debug_assert!(mr % LANES == 0);
    debug_assert!(a.len() >= depth * mr && b.len() >= depth * nr && c.len() >= mr * nr);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let c_ptr = c.as_mut_ptr();

    for j in 0..nr {
        for i in (0..mr).step_by(LANES) {
            let out = c_ptr.add(j * mr + i);
            let mut acc = _mm256_loadu_pd(out);
            for p in 0..depth {
                let a_vec = _mm256_loadu_pd(a_ptr.add(p * mr + i));
                let b_vec = _mm256_broadcast_sd(&*b_ptr.add(p * nr + j));
                acc = _mm256_fmadd_pd(a_vec, b_vec, acc);
            }
            _mm256_storeu_pd(out, acc);
        }
    }
}

impl<T: Transform> MicroKernel for Avx2Kernel<T> {
    fn name(&self) -> &'static str {
        "avx2"
    }

    fn kind(&self) -> KernelKind {
        T::KIND
    }

    fn rank_k(
        &self,
        shape: &TileShape,
        a: &[f64],
        b: &[f64],
        next_b: &[f64],
        c: &mut [f64],
        accumulate: bool,
    ) {
        let c = &mut c[..shape.area()];
        if !accumulate {
            c.fill(0.0);
        }
        // SAFETY: only reachable through `is_supported`; lengths come from the
        // packed panels of the current block.
        unsafe {
            if !next_b.is_empty() {
                _mm_prefetch::<_MM_HINT_T0>(next_b.as_ptr().cast::<i8>());
            }
            rank_k_fma(shape, a, b, c);
        }
    }

    fn fused(&self, shape: &TileShape, tile: &FusedTile<'_>, u: &mut [f64]) {
        let mut c = [0.0f64; MAX_TILE];
        let c = &mut c[..shape.area()];
        if let Some(partial) = tile.partial {
            c.copy_from_slice(&partial[..shape.area()]);
        }
        // SAFETY: as in `rank_k`.
        unsafe { rank_k_fma(shape, tile.a, tile.b, c) };
        contract::<T>(shape, tile, c, u);
    }
}
