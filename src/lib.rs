//! # gsks
//!
//! Blocked, multi-threaded kernel summation over index-selected point sets:
//!
//! ```text
//! potentials[d_i][r] += sum_j K(x_{a_i}, y_{b_j}) * weights[w_j][r]
//! ```
//!
//! for every target `i` and every right-hand-side column `r`, where the
//! target, source, weight and destination rows are addressed through
//! arbitrary index maps (unsorted, duplicates allowed).
//!
//! The engine follows the GotoBLAS/BLIS loop nest: source blocks of `NC`
//! points, coordinate chunks of `KC`, target blocks of `MC` points, and
//! `MR x NR` register tiles computed by a micro-kernel that fuses the rank-k
//! inner products, the kernel transform and the weight contraction.
//!
//! ## Example
//!
//! ```rust
//! use gsks::{Kernel, Operands, PointSet, SummationConfig, Summator};
//!
//! # fn main() -> gsks::Result<()> {
//! let coords = [0.0, 1.0, 2.0, 3.0, 4.0];
//! let points = PointSet::new(&coords, 1)?;
//! let map = [0, 1, 2, 3, 4];
//! let weights = [1.0; 5];
//!
//! let summator = Summator::new(SummationConfig::default().with_threads(2))?;
//! let operands = Operands::new(points, &map, points, &map, &weights, 1);
//!
//! let mut potentials = vec![0.0; 5];
//! summator.sum(&Kernel::gaussian(-1.0), &operands, &mut potentials)?;
//! assert!(potentials[2] > 1.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`kernel`]: kernel kinds, hyperparameters and elementwise transforms
//! - [`points`]: borrowed coordinate tables
//! - [`planner`]: the loop nest and [`Summator`]
//! - [`micro`]: register-tile compute backends (portable, AVX2)
//! - [`batch`]: list front-end over many index-map pairs
//! - [`reference`]: unblocked oracle for testing

pub mod batch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod micro;
pub mod planner;
pub mod points;
pub mod reference;

mod macro_kernel;
mod pack;

pub use config::{Blocking, SummationConfig};
pub use error::{GsksError, Result};
pub use kernel::{Bandwidth, Kernel, KernelKind, ResolvedKernel};
pub use planner::{Operands, Summator};
pub use points::PointSet;

pub const MR: usize = 8;
pub const NR: usize = 4;

pub const MC: usize = MR * 12;
pub const NC: usize = NR * 256;
pub const KC: usize = 256;

/// Upper bound on `mr * nr`, the stack tile of the fused micro-kernels.
pub const MAX_TILE: usize = 256;
