//! Register-tile compute primitives.
//!
//! A micro-kernel owns the innermost computation on one `mr x nr` tile:
//! the rank-k inner products between a packed target tile and a packed
//! source tile, and the fused variant that also applies the kernel transform
//! and contracts the resulting values against the packed weights.
//!
//! Implementations are interchangeable. [`select`] resolves one per call from
//! the registry of backends, monomorphized over the kernel's [`Transform`], so
//! the per-tile hot path never branches on the kernel kind.

use crate::config::Blocking;
use crate::kernel::{transform, KernelKind, KernelParams, Transform};

pub mod scalar;

#[cfg(all(avx2, target_arch = "x86_64"))]
pub mod avx2;

pub use scalar::ScalarKernel;

/// Dimensions shared by every tile of one macro-kernel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileShape {
    pub mr: usize,
    pub nr: usize,
    /// Coordinates per point in the current chunk.
    pub depth: usize,
    pub rhs: usize,
}

impl TileShape {
    #[inline(always)]
    pub fn area(&self) -> usize {
        self.mr * self.nr
    }
}

/// Packed operands of one fused tile.
///
/// Layouts: `a[p * mr + i]`, `b[p * nr + j]`, `partial[j * mr + i]`,
/// `weights[r * nr + j]`. Auxiliary slices hold one value per lane and are
/// ignored by kernels that do not need them.
///
/// Only the first `columns` source lanes hold real sources. Padding lanes are
/// left out of the weight contraction, so a non-finite kernel value on a
/// replicated lane never reaches the potentials.
#[derive(Debug, Clone, Copy)]
pub struct FusedTile<'a> {
    pub params: &'a KernelParams,
    /// Live source lanes, `1..=nr`.
    pub columns: usize,
    pub a: &'a [f64],
    pub b: &'a [f64],
    /// Inner products accumulated by earlier coordinate chunks.
    pub partial: Option<&'a [f64]>,
    pub a_sq_norms: &'a [f64],
    pub b_sq_norms: &'a [f64],
    pub b_bandwidth: &'a [f64],
    pub weights: &'a [f64],
}

/// The tile-level compute contract.
pub trait MicroKernel: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    fn kind(&self) -> KernelKind;

    /// `c[j * mr + i] (+)= sum_p a[p * mr + i] * b[p * nr + j]`.
    ///
    /// Overwrites `c` when `accumulate` is false. `next_b` is the source tile
    /// the caller will visit next; it may be empty and is only a prefetch hint.
    fn rank_k(
        &self,
        shape: &TileShape,
        a: &[f64],
        b: &[f64],
        next_b: &[f64],
        c: &mut [f64],
        accumulate: bool,
    );

    /// Completes the inner products (continuing `tile.partial` when present),
    /// applies the kernel transform and adds `K * W` into `u[r * mr + i]`.
    fn fused(&self, shape: &TileShape, tile: &FusedTile<'_>, u: &mut [f64]);
}

/// Applies the transform to a finished inner-product tile and contracts it
/// against the weights. Shared by every backend.
#[inline(always)]
pub(crate) fn contract<T: Transform>(
    shape: &TileShape,
    tile: &FusedTile<'_>,
    c: &[f64],
    u: &mut [f64],
) {
    let TileShape { mr, nr, rhs, .. } = *shape;
    debug_assert!(tile.columns <= nr);
    for j in 0..tile.columns {
        let b2 = tile.b_sq_norms[j];
        let h = tile.b_bandwidth[j];
        let column = &c[j * mr..(j + 1) * mr];
        for (i, &inner) in column.iter().enumerate() {
            let value = T::apply(tile.params, inner, tile.a_sq_norms[i], b2, h);
            for r in 0..rhs {
                u[r * mr + i] += value * tile.weights[r * nr + j];
            }
        }
    }
}

/// A family of micro-kernels, one per transform.
trait Backend {
    fn build<T: Transform>() -> Box<dyn MicroKernel>;
}

fn instantiate<B: Backend>(kind: KernelKind) -> Box<dyn MicroKernel> {
    match kind {
        KernelKind::Gaussian => B::build::<transform::Gaussian>(),
        KernelKind::GaussianVariableBandwidth => B::build::<transform::VariableBandwidth>(),
        KernelKind::Polynomial => B::build::<transform::Polynomial>(),
        KernelKind::Laplace => B::build::<transform::Laplace>(),
        KernelKind::Tanh => B::build::<transform::Tanh>(),
        KernelKind::Quartic => B::build::<transform::Quartic>(),
        KernelKind::Multiquadratic => B::build::<transform::Multiquadratic>(),
        KernelKind::Epanechnikov => B::build::<transform::Epanechnikov>(),
    }
}

/// The portable micro-kernel for `kind`.
pub fn scalar(kind: KernelKind) -> Box<dyn MicroKernel> {
    instantiate::<scalar::ScalarBackend>(kind)
}

/// The fastest micro-kernel available for `kind` under `blocking` on this CPU.
pub fn select(kind: KernelKind, blocking: &Blocking) -> Box<dyn MicroKernel> {
    #[cfg(all(avx2, target_arch = "x86_64"))]
    {
        if avx2::is_supported(blocking) {
            return instantiate::<avx2::Avx2Backend>(kind);
        }
    }
    #[cfg(not(all(avx2, target_arch = "x86_64")))]
    let _ = blocking;

    scalar(kind)
}
