//! Tiling loops over one (source block, target block, coordinate chunk).
//!
//! Both variants walk the block in `nr`-wide source tiles (outer) and
//! `mr`-high target tiles (inner). The partial accumulator of a target block
//! stores tile `(jr, ir)` at `((jr * m_tiles) + ir) * mr * nr`.

use std::cmp::min;

use crate::micro::{FusedTile, MicroKernel, TileShape};
use crate::kernel::KernelParams;

/// Extent of one block triple.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockShape {
    /// Live targets in the block.
    pub ib: usize,
    /// Live sources in the block.
    pub jb: usize,
    pub tile: TileShape,
}

impl BlockShape {
    #[inline(always)]
    pub fn m_tiles(&self) -> usize {
        self.ib.div_ceil(self.tile.mr)
    }

    #[inline(always)]
    pub fn n_tiles(&self) -> usize {
        self.jb.div_ceil(self.tile.nr)
    }
}

/// Packed target side of a block.
pub(crate) struct TargetPanel<'a> {
    pub coords: &'a [f64],
    pub sq_norms: &'a [f64],
}

/// Packed source side of a block.
pub(crate) struct SourcePanel<'a> {
    pub coords: &'a [f64],
    pub sq_norms: &'a [f64],
    pub bandwidth: &'a [f64],
    pub weights: &'a [f64],
}

/// Accumulates the chunk's inner products into `accumulator`.
///
/// The first chunk must pass `accumulate = false` so stale values from the
/// previous source block are overwritten.
pub(crate) fn rank_k_macro_kernel(
    micro: &dyn MicroKernel,
    shape: &BlockShape,
    targets: &[f64],
    sources: &[f64],
    accumulator: &mut [f64],
    accumulate: bool,
) {
    let tile = &shape.tile;
    let m_tiles = shape.m_tiles();
    let n_tiles = shape.n_tiles();
    let a_len = tile.mr * tile.depth;
    let b_len = tile.nr * tile.depth;
    let c_len = tile.area();

    for jr in 0..n_tiles {
        let b = &sources[jr * b_len..(jr + 1) * b_len];
        let next_b = if jr + 1 < n_tiles {
            &sources[(jr + 1) * b_len..(jr + 2) * b_len]
        } else {
            &[]
        };
        for ir in 0..m_tiles {
            let a = &targets[ir * a_len..(ir + 1) * a_len];
            let offset = (jr * m_tiles + ir) * c_len;
            let c = &mut accumulator[offset..offset + c_len];
            micro.rank_k(tile, a, b, next_b, c, accumulate);
        }
    }
}

/// Finishes the block: last chunk of inner products, transform and
/// contraction into the block's potential panel (`mr * rhs` per target tile).
pub(crate) fn fused_macro_kernel(
    micro: &dyn MicroKernel,
    shape: &BlockShape,
    params: &KernelParams,
    targets: &TargetPanel<'_>,
    sources: &SourcePanel<'_>,
    partial: Option<&[f64]>,
    potentials: &mut [f64],
) {
    let tile = &shape.tile;
    let (mr, nr, rhs) = (tile.mr, tile.nr, tile.rhs);
    let m_tiles = shape.m_tiles();
    let n_tiles = shape.n_tiles();
    let a_len = mr * tile.depth;
    let b_len = nr * tile.depth;
    let c_len = tile.area();

    for jr in 0..n_tiles {
        for ir in 0..m_tiles {
            let offset = (jr * m_tiles + ir) * c_len;
            let operands = FusedTile {
                params,
                columns: min(nr, shape.jb - jr * nr),
                a: &targets.coords[ir * a_len..(ir + 1) * a_len],
                b: &sources.coords[jr * b_len..(jr + 1) * b_len],
                partial: partial.map(|acc| &acc[offset..offset + c_len]),
                a_sq_norms: &targets.sq_norms[ir * mr..(ir + 1) * mr],
                b_sq_norms: &sources.sq_norms[jr * nr..(jr + 1) * nr],
                b_bandwidth: &sources.bandwidth[jr * nr..(jr + 1) * nr],
                weights: &sources.weights[jr * nr * rhs..(jr + 1) * nr * rhs],
            };
            let u = &mut potentials[ir * mr * rhs..(ir + 1) * mr * rhs];
            micro.fused(tile, &operands, u);
        }
    }
}
