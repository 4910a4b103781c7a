//! The blocked summation loop nest.
//!
//! For every source block of `nc` points and every coordinate chunk of `kc`:
//!
//! 1. sources, weights and source auxiliaries are packed in parallel, one
//!    `nr` tile per task;
//! 2. target blocks of `mc` points run in waves of `threads` blocks, each
//!    block packing its targets into a private arena slot and calling the
//!    macro-kernel;
//! 3. after a wave on the last chunk, the potential panels are added into the
//!    caller's table sequentially.
//!
//! When `k <= kc` the fused macro-kernel runs directly (single pass).
//! Otherwise the rank-k products of all chunks but the last are accumulated
//! into a packed partial buffer, and the last chunk runs the fused
//! macro-kernel on top of it (multi pass).

use std::cmp::min;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::config::{Blocking, SummationConfig};
use crate::error::{validation_error, zeroed_panel, GsksError, Result};
use crate::kernel::{Bandwidth, Kernel, ResolvedKernel};
use crate::macro_kernel::{
    fused_macro_kernel, rank_k_macro_kernel, BlockShape, SourcePanel, TargetPanel,
};
use crate::micro::{self, MicroKernel, TileShape};
use crate::pack::{pack_aux, pack_points, pack_weights, seed_potentials, unpack_potentials};
use crate::points::{check_indices, PointSet};

/// Tables and index maps of one summation call.
///
/// `weights` and the potential table passed to [`Summator::sum`] are
/// row-major with `rhs` columns. By default the weight map is the source map
/// and the destination map is the target map.
#[derive(Debug, Clone, Copy)]
pub struct Operands<'a> {
    pub targets: PointSet<'a>,
    pub target_map: &'a [usize],
    pub sources: PointSet<'a>,
    pub source_map: &'a [usize],
    pub weights: &'a [f64],
    pub weight_map: &'a [usize],
    pub destination_map: &'a [usize],
    pub rhs: usize,
}

impl<'a> Operands<'a> {
    /// Operands with the default weight and destination maps.
    ///
    /// # Arguments
    ///
    /// * `targets` - Point table the target map indexes.
    /// * `target_map` - One row of `targets` per target; also the destination
    ///   map until [`Operands::with_destination_map`] replaces it.
    /// * `sources` - Point table the source map indexes.
    /// * `source_map` - One row of `sources` per source; also the weight map
    ///   until [`Operands::with_weight_map`] replaces it.
    /// * `weights` - Row-major `[rows x rhs]` weight table.
    /// * `rhs` - Number of right-hand-side columns.
    pub fn new(
        targets: PointSet<'a>,
        target_map: &'a [usize],
        sources: PointSet<'a>,
        source_map: &'a [usize],
        weights: &'a [f64],
        rhs: usize,
    ) -> Self {
        Self {
            targets,
            target_map,
            sources,
            source_map,
            weights,
            weight_map: source_map,
            destination_map: target_map,
            rhs,
        }
    }

    /// Accumulates target `i` into potential row `destination_map[i]`.
    pub fn with_destination_map(mut self, destination_map: &'a [usize]) -> Self {
        self.destination_map = destination_map;
        self
    }

    /// Reads the weights of source `j` from row `weight_map[j]`.
    pub fn with_weight_map(mut self, weight_map: &'a [usize]) -> Self {
        self.weight_map = weight_map;
        self
    }

    /// Number of targets.
    pub fn m(&self) -> usize {
        self.target_map.len()
    }

    /// Number of sources.
    pub fn n(&self) -> usize {
        self.source_map.len()
    }

    /// Point dimension.
    pub fn k(&self) -> usize {
        self.targets.dim()
    }

    /// No targets, no sources or zero-dimensional points: nothing to sum.
    pub(crate) fn is_degenerate(&self) -> bool {
        self.m() == 0 || self.n() == 0 || self.k() == 0 || self.sources.dim() == 0
    }

    pub(crate) fn validate_shapes(&self) -> Result<()> {
        if self.targets.dim() != self.sources.dim() {
            return Err(validation_error(format!(
                "target dimension {} differs from source dimension {}",
                self.targets.dim(),
                self.sources.dim()
            )));
        }
        Ok(())
    }

    pub(crate) fn validate(
        &self,
        kernel: &Kernel<'_>,
        resolved: &ResolvedKernel,
        potentials: usize,
    ) -> Result<()> {
        let rhs = self.rhs;
        if rhs == 0 {
            return Err(validation_error("RHS width must be > 0"));
        }
        if self.weights.len() % rhs != 0 {
            return Err(validation_error(format!(
                "weight table of length {} is not a multiple of RHS width {}",
                self.weights.len(),
                rhs
            )));
        }
        if potentials % rhs != 0 {
            return Err(validation_error(format!(
                "potential table of length {} is not a multiple of RHS width {}",
                potentials, rhs
            )));
        }
        if self.weight_map.len() != self.n() {
            return Err(validation_error(format!(
                "weight map has {} entries for {} sources",
                self.weight_map.len(),
                self.n()
            )));
        }
        if self.destination_map.len() != self.m() {
            return Err(validation_error(format!(
                "destination map has {} entries for {} targets",
                self.destination_map.len(),
                self.m()
            )));
        }

        check_indices("target", self.target_map, self.targets.len())?;
        check_indices("source", self.source_map, self.sources.len())?;
        check_indices("weight", self.weight_map, self.weights.len() / rhs)?;
        check_indices("destination", self.destination_map, potentials / rhs)?;

        if resolved.traits.needs_bandwidth {
            // resolve() guarantees the vectors are present
            if let Some(Bandwidth { target, source }) = kernel.bandwidth {
                if target.len() < self.targets.len() || source.len() < self.sources.len() {
                    return Err(validation_error(format!(
                        "bandwidth vectors of length {}/{} for {}/{} points",
                        target.len(),
                        source.len(),
                        self.targets.len(),
                        self.sources.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// How the coordinate dimension is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `k <= kc`: one fused pass per block pair.
    SinglePass,
    /// `k > kc`: rank-k passes over a partial accumulator, fused on the last chunk.
    MultiPass { chunks: usize },
}

/// Block counts and buffer extents of one call.
#[derive(Debug, Clone, Copy)]
struct Plan {
    m: usize,
    n: usize,
    k: usize,
    rhs: usize,
    blocking: Blocking,
    strategy: Strategy,
    /// Largest chunk depth.
    depth: usize,
    m_blocks: usize,
    n_blocks: usize,
    /// Padded width of a source block.
    padn: usize,
    /// Padded height of a target block.
    padm: usize,
    /// Arena slots, the number of target blocks run concurrently.
    slots: usize,
}

impl Plan {
    fn new(m: usize, n: usize, k: usize, rhs: usize, blocking: Blocking, threads: usize) -> Self {
        let strategy = if k <= blocking.kc {
            Strategy::SinglePass
        } else {
            Strategy::MultiPass {
                chunks: k.div_ceil(blocking.kc),
            }
        };
        let m_blocks = m.div_ceil(blocking.mc);
        Self {
            m,
            n,
            k,
            rhs,
            blocking,
            strategy,
            depth: min(k, blocking.kc),
            m_blocks,
            n_blocks: n.div_ceil(blocking.nc),
            padn: blocking.pad_n(min(n, blocking.nc)),
            padm: blocking.pad_m(min(m, blocking.mc)),
            slots: min(threads, m_blocks),
        }
    }

    fn is_multi_pass(&self) -> bool {
        matches!(self.strategy, Strategy::MultiPass { .. })
    }
}

/// Private scratch of one target block.
struct TargetScratch {
    coords: Vec<f64>,
    sq_norms: Vec<f64>,
    potentials: Vec<f64>,
}

impl TargetScratch {
    fn new(plan: &Plan) -> Result<Self> {
        Ok(Self {
            coords: zeroed_panel(plan.padm * plan.depth)?,
            sq_norms: zeroed_panel(plan.padm)?,
            potentials: zeroed_panel(plan.padm * plan.rhs)?,
        })
    }
}

/// Packed source block shared by every target block.
struct SourceScratch {
    coords: Vec<f64>,
    sq_norms: Vec<f64>,
    bandwidth: Vec<f64>,
    weights: Vec<f64>,
}

impl SourceScratch {
    fn new(plan: &Plan) -> Result<Self> {
        Ok(Self {
            coords: zeroed_panel(plan.padn * plan.depth)?,
            sq_norms: zeroed_panel(plan.padn)?,
            bandwidth: zeroed_panel(plan.padn)?,
            weights: zeroed_panel(plan.padn * plan.rhs)?,
        })
    }
}

/// Runs kernel summations with a fixed configuration and worker pool.
pub struct Summator {
    config: SummationConfig,
    pool: ThreadPool,
}

impl Summator {
    /// Validates `config` and starts its worker pool.
    ///
    /// Workers are named `gsks-worker-{index}` and live as long as the
    /// summator, so one summator should be reused across calls.
    ///
    /// # Errors
    ///
    /// * [`GsksError::Config`] for an invalid thread count or blocking.
    /// * [`GsksError::ThreadPool`] when the pool cannot be built.
    pub fn new(config: SummationConfig) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|index| format!("gsks-worker-{}", index))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &SummationConfig {
        &self.config
    }

    /// `potentials[d_i][r] += sum_j K(x_i, y_j) * weights[w_j][r]` for every
    /// target `i` and RHS column `r`.
    ///
    /// Everything is validated before any scratch is allocated; on error the
    /// potential table is untouched. With no targets, no sources or zero
    /// dimension the call returns immediately.
    pub fn sum(
        &self,
        kernel: &Kernel<'_>,
        operands: &Operands<'_>,
        potentials: &mut [f64],
    ) -> Result<()> {
        let (m, n, k) = (operands.m(), operands.n(), operands.k());
        if operands.is_degenerate() {
            debug!(m, n, k, "empty summation");
            return Ok(());
        }
        operands.validate_shapes()?;

        let resolved = kernel.resolve(k)?;
        operands.validate(kernel, &resolved, potentials.len())?;

        let blocking = self.config.blocking;
        let micro = micro::select(resolved.kind, &blocking);
        let plan = Plan::new(m, n, k, operands.rhs, blocking, self.config.threads);

        debug!(
            kernel = %resolved.kind,
            micro_kernel = micro.name(),
            strategy = ?plan.strategy,
            m,
            n,
            k,
            rhs = plan.rhs,
            m_blocks = plan.m_blocks,
            n_blocks = plan.n_blocks,
            threads = self.config.threads,
            "planned kernel summation"
        );

        self.pool.install(|| {
            execute(
                &plan,
                &resolved,
                kernel.bandwidth,
                micro.as_ref(),
                operands,
                potentials,
            )
        })
    }
}

fn execute(
    plan: &Plan,
    kernel: &ResolvedKernel,
    bandwidth: Option<Bandwidth<'_>>,
    micro: &dyn MicroKernel,
    operands: &Operands<'_>,
    potentials: &mut [f64],
) -> Result<()> {
    let Blocking { mr, nr, kc, mc, nc } = plan.blocking;
    let (m, n, k, rhs) = (plan.m, plan.n, plan.k, plan.rhs);
    let traits = kernel.traits;
    let multi_pass = plan.is_multi_pass();

    let mut source = SourceScratch::new(plan)?;
    let mut arena = (0..plan.slots)
        .map(|_| TargetScratch::new(plan))
        .collect::<Result<Vec<_>>>()?;
    // partial accumulator of one target block, multi-pass only
    let (partial_stride, mut accumulator) = if multi_pass {
        let stride = mc
            .checked_mul(plan.padn)
            .ok_or(GsksError::Allocation {
                requested_size: usize::MAX,
            })?;
        (stride, zeroed_panel(plan.blocking.pad_m(m) * plan.padn)?)
    } else {
        (0, Vec::new())
    };

    let targets = &operands.targets;
    let sources = &operands.sources;

    for jc in (0..n).step_by(nc) {
        let jb = min(nc, n - jc);
        let source_ids = &operands.source_map[jc..jc + jb];
        let weight_ids = &operands.weight_map[jc..jc + jb];
        let n_tiles = jb.div_ceil(nr);
        trace!(jc, jb, "source block");

        for pc in (0..k).step_by(kc) {
            let pb = min(kc, k - pc);
            let last = k - pc <= kc;

            // Region (a): source tiles.
            source.coords[..n_tiles * nr * pb]
                .par_chunks_mut(nr * pb)
                .zip(source.weights.par_chunks_mut(nr * rhs))
                .zip(source.sq_norms.par_chunks_mut(nr))
                .zip(source.bandwidth.par_chunks_mut(nr))
                .zip(source_ids.par_chunks(nr))
                .zip(weight_ids.par_chunks(nr))
                .for_each(|(((((coords, weights), sq_norms), h), ids), wids)| {
                    pack_points(sources, ids, pc, pb, nr, coords);
                    if last {
                        pack_weights(operands.weights, rhs, wids, nr, weights);
                        if traits.needs_sq_norm {
                            pack_aux(ids, nr, sq_norms, |p| sources.squared_norm(p));
                        }
                        if traits.needs_bandwidth {
                            if let Some(bw) = bandwidth {
                                pack_aux(ids, nr, h, |p| bw.source[p]);
                            }
                        }
                    }
                });

            let source_panel = SourcePanel {
                coords: &source.coords,
                sq_norms: &source.sq_norms,
                bandwidth: &source.bandwidth,
                weights: &source.weights,
            };

            // Region (b): target blocks, `slots` at a time.
            for wave in (0..plan.m_blocks).step_by(plan.slots) {
                let wave_len = min(plan.slots, plan.m_blocks - wave);
                let partials: Vec<Option<&mut [f64]>> = if multi_pass {
                    let start = wave * partial_stride;
                    let end = min(
                        (wave + wave_len).saturating_mul(partial_stride),
                        accumulator.len(),
                    );
                    accumulator[start..end]
                        .chunks_mut(partial_stride)
                        .map(Some)
                        .collect()
                } else {
                    (0..wave_len).map(|_| None).collect()
                };

                arena[..wave_len]
                    .par_iter_mut()
                    .zip(partials)
                    .enumerate()
                    .for_each(|(slot, (scratch, partial))| {
                        let ic = (wave + slot) * mc;
                        let ib = min(mc, m - ic);
                        let target_ids = &operands.target_map[ic..ic + ib];

                        for (tile, ids) in target_ids.chunks(mr).enumerate() {
                            let coords = &mut scratch.coords[tile * mr * pb..(tile + 1) * mr * pb];
                            pack_points(targets, ids, pc, pb, mr, coords);
                            if last && traits.needs_sq_norm {
                                let norms = &mut scratch.sq_norms[tile * mr..(tile + 1) * mr];
                                pack_aux(ids, mr, norms, |p| targets.squared_norm(p));
                            }
                        }

                        let shape = BlockShape {
                            ib,
                            jb,
                            tile: TileShape {
                                mr,
                                nr,
                                depth: pb,
                                rhs,
                            },
                        };

                        if !last {
                            if let Some(acc) = partial {
                                rank_k_macro_kernel(
                                    micro,
                                    &shape,
                                    &scratch.coords,
                                    &source.coords,
                                    acc,
                                    pc > 0,
                                );
                            }
                            return;
                        }

                        let panel_len = shape.m_tiles() * mr * rhs;
                        seed_potentials(&mut scratch.potentials[..panel_len]);
                        let target_panel = TargetPanel {
                            coords: &scratch.coords,
                            sq_norms: &scratch.sq_norms,
                        };
                        fused_macro_kernel(
                            micro,
                            &shape,
                            &kernel.params,
                            &target_panel,
                            &source_panel,
                            partial.as_deref(),
                            &mut scratch.potentials[..panel_len],
                        );
                    });

                if last {
                    for (slot, scratch) in arena[..wave_len].iter().enumerate() {
                        let ic = (wave + slot) * mc;
                        let ib = min(mc, m - ic);
                        let destination_ids = &operands.destination_map[ic..ic + ib];
                        for (tile, ids) in destination_ids.chunks(mr).enumerate() {
                            let panel = &scratch.potentials[tile * mr * rhs..(tile + 1) * mr * rhs];
                            unpack_potentials(panel, ids, mr, rhs, potentials);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
