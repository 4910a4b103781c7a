//! Blocking and threading configuration.
//!
//! The block and tile sizes are performance parameters only: any valid
//! [`Blocking`] produces the same potentials (up to floating-point
//! reassociation inside the micro-kernel).

use crate::error::{config_error, Result};
use crate::{KC, MAX_TILE, MC, MR, NC, NR};

/// Cache and register blocking sizes for one summation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocking {
    /// Register tile height (targets per micro-kernel call).
    pub mr: usize,
    /// Register tile width (sources per micro-kernel call).
    pub nr: usize,
    /// Coordinate chunk depth. Dimensions above `kc` take the multi-pass path.
    pub kc: usize,
    /// Target cache block. Must be a multiple of `mr`.
    pub mc: usize,
    /// Source cache block. Must be a multiple of `nr`.
    pub nc: usize,
}

impl Default for Blocking {
    fn default() -> Self {
        Self {
            mr: MR,
            nr: NR,
            kc: KC,
            mc: MC,
            nc: NC,
        }
    }
}

impl Blocking {
    /// Checks the invariants the planner relies on.
    pub fn validate(&self) -> Result<()> {
        if self.mr == 0 || self.nr == 0 || self.kc == 0 || self.mc == 0 || self.nc == 0 {
            return Err(config_error(format!(
                "block sizes must be > 0 (mr={}, nr={}, kc={}, mc={}, nc={})",
                self.mr, self.nr, self.kc, self.mc, self.nc
            )));
        }
        if self.mc % self.mr != 0 {
            return Err(config_error(format!(
                "mc ({}) must be a multiple of mr ({})",
                self.mc, self.mr
            )));
        }
        if self.nc % self.nr != 0 {
            return Err(config_error(format!(
                "nc ({}) must be a multiple of nr ({})",
                self.nc, self.nr
            )));
        }
        if self.mr.checked_mul(self.nr).map_or(true, |area| area > MAX_TILE) {
            return Err(config_error(format!(
                "register tile {}x{} exceeds {} elements",
                self.mr, self.nr, MAX_TILE
            )));
        }
        Ok(())
    }

    /// Rounds `m` up to whole register tiles of height `mr`.
    #[inline(always)]
    pub(crate) fn pad_m(&self, m: usize) -> usize {
        m.div_ceil(self.mr) * self.mr
    }

    /// Rounds `n` up to whole register tiles of width `nr`.
    #[inline(always)]
    pub(crate) fn pad_n(&self, n: usize) -> usize {
        n.div_ceil(self.nr) * self.nr
    }
}

/// Configuration of a [`crate::Summator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummationConfig {
    /// Worker threads for the fork-join regions. `1` runs sequentially.
    pub threads: usize,
    /// Cache and register blocking.
    pub blocking: Blocking,
}

impl Default for SummationConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            blocking: Blocking::default(),
        }
    }
}

impl SummationConfig {
    /// Sets the number of worker threads. Must be at least one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Replaces the block and tile sizes.
    pub fn with_blocking(mut self, blocking: Blocking) -> Self {
        self.blocking = blocking;
        self
    }

    /// Checks the thread count and the [`Blocking`] invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GsksError::Config`](crate::GsksError::Config) describing the
    /// first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(config_error("thread count must be > 0"));
        }
        self.blocking.validate()
    }
}
