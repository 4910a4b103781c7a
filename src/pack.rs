//! Gather and scatter between the caller's tables and contiguous panels.
//!
//! Every routine handles one register tile (`tile` = `mr` on the target side,
//! `nr` on the source side) whose index slice may be shorter than the tile.
//! Ragged coordinate and auxiliary tiles replicate their first element, so
//! padding lanes compute finite, discarded values; ragged weight tiles are
//! zero so padding columns contribute nothing to the reduction.
//!
//! Panel layouts:
//!
//! ```text
//! coordinates  out[p * tile + i]   p < depth, i < tile
//! auxiliary    out[i]
//! weights      out[r * nr + j]     r < rhs,   j < nr
//! potentials   panel[r * mr + i]   r < rhs,   i < mr
//! ```

use crate::points::PointSet;

/// Packs coordinates `offset..offset + depth` of the points named by `ids`.
pub(crate) fn pack_points(
    points: &PointSet<'_>,
    ids: &[usize],
    offset: usize,
    depth: usize,
    tile: usize,
    out: &mut [f64],
) {
    debug_assert!(!ids.is_empty() && ids.len() <= tile);
    debug_assert!(out.len() >= depth * tile);

    for (i, &id) in ids.iter().enumerate() {
        let row = &points.point(id)[offset..offset + depth];
        for (p, &x) in row.iter().enumerate() {
            out[p * tile + i] = x;
        }
    }

    if ids.len() < tile {
        for p in 0..depth {
            let first = out[p * tile];
            out[p * tile + ids.len()..(p + 1) * tile].fill(first);
        }
    }
}

/// Gathers one auxiliary scalar per point (squared norm, bandwidth).
pub(crate) fn pack_aux(ids: &[usize], tile: usize, out: &mut [f64], value: impl Fn(usize) -> f64) {
    debug_assert!(!ids.is_empty() && ids.len() <= tile);

    for (slot, &id) in out.iter_mut().zip(ids) {
        *slot = value(id);
    }
    let first = out[0];
    out[ids.len()..tile].fill(first);
}

/// Packs weight rows `ids` of a `[rows x rhs]` table into RHS-major order.
pub(crate) fn pack_weights(weights: &[f64], rhs: usize, ids: &[usize], nr: usize, out: &mut [f64]) {
    debug_assert!(ids.len() <= nr);
    debug_assert!(out.len() >= rhs * nr);

    for r in 0..rhs {
        let column = &mut out[r * nr..(r + 1) * nr];
        for (slot, &id) in column.iter_mut().zip(ids) {
            *slot = weights[id * rhs + r];
        }
        column[ids.len()..].fill(0.0);
    }
}

/// Prepares a block's potential panel for the fused macro-kernel.
///
/// The panel only collects this block's contribution; the caller's values are
/// folded back in by [`unpack_potentials`].
#[inline]
pub(crate) fn seed_potentials(panel: &mut [f64]) {
    panel.fill(0.0);
}

/// Adds the first `ids.len()` rows of a potential tile into `potentials`.
///
/// Duplicate ids accumulate, each row adding its own contribution.
pub(crate) fn unpack_potentials(
    panel: &[f64],
    ids: &[usize],
    mr: usize,
    rhs: usize,
    potentials: &mut [f64],
) {
    debug_assert!(ids.len() <= mr);

    for (i, &id) in ids.iter().enumerate() {
        let row = &mut potentials[id * rhs..(id + 1) * rhs];
        for (r, u) in row.iter_mut().enumerate() {
            *u += panel[r * mr + i];
        }
    }
}
