//! List front-end: one summation per (target list, source list) pair.
//!
//! Used by tree codes that evaluate many small near-field interactions over
//! the same point tables. Pairs run one after another, each call parallel
//! inside; every list is validated before the first pair is summed.

use tracing::debug;

use crate::error::{validation_error, Result};
use crate::kernel::Kernel;
use crate::planner::{Operands, Summator};
use crate::points::{check_indices, PointSet};

/// Backing tables shared by every pair of a list call.
#[derive(Debug, Clone, Copy)]
pub struct Tables<'a> {
    pub targets: PointSet<'a>,
    pub sources: PointSet<'a>,
    /// Row-major `[rows x rhs]`.
    pub weights: &'a [f64],
    pub rhs: usize,
}

impl<'a> Tables<'a> {
    pub fn new(targets: PointSet<'a>, sources: PointSet<'a>, weights: &'a [f64], rhs: usize) -> Self {
        Self {
            targets,
            sources,
            weights,
            rhs,
        }
    }

    /// One point table serving as both targets and sources.
    pub fn symmetric(points: PointSet<'a>, weights: &'a [f64], rhs: usize) -> Self {
        Self::new(points, points, weights, rhs)
    }
}

/// Ragged index lists, entry `p` of each describing pair `p`.
///
/// Weight lists default to the source lists and destination lists to the
/// target lists.
#[derive(Debug, Clone, Copy)]
pub struct IndexLists<'a> {
    pub targets: &'a [Vec<usize>],
    pub sources: &'a [Vec<usize>],
    pub weights: Option<&'a [Vec<usize>]>,
    pub destinations: Option<&'a [Vec<usize>]>,
}

impl<'a> IndexLists<'a> {
    pub fn new(targets: &'a [Vec<usize>], sources: &'a [Vec<usize>]) -> Self {
        Self {
            targets,
            sources,
            weights: None,
            destinations: None,
        }
    }

    pub fn with_weights(mut self, weights: &'a [Vec<usize>]) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_destinations(mut self, destinations: &'a [Vec<usize>]) -> Self {
        self.destinations = Some(destinations);
        self
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn operands(&self, tables: &Tables<'a>, pair: usize) -> Operands<'a> {
        let target_map = self.targets[pair].as_slice();
        let source_map = self.sources[pair].as_slice();
        let mut operands = Operands::new(
            tables.targets,
            target_map,
            tables.sources,
            source_map,
            tables.weights,
            tables.rhs,
        );
        if let Some(weights) = self.weights {
            operands = operands.with_weight_map(&weights[pair]);
        }
        if let Some(destinations) = self.destinations {
            operands = operands.with_destination_map(&destinations[pair]);
        }
        operands
    }

    fn validate(&self, tables: &Tables<'_>, potentials: usize) -> Result<()> {
        let pairs = self.len();
        let mismatch = |name: &str, len: usize| {
            validation_error(format!(
                "{} list count {} differs from target list count {}",
                name, len, pairs
            ))
        };
        if self.sources.len() != pairs {
            return Err(mismatch("source", self.sources.len()));
        }
        if let Some(weights) = self.weights {
            if weights.len() != pairs {
                return Err(mismatch("weight", weights.len()));
            }
        }
        if let Some(destinations) = self.destinations {
            if destinations.len() != pairs {
                return Err(mismatch("destination", destinations.len()));
            }
        }
        if tables.rhs == 0 {
            return Err(validation_error("RHS width must be > 0"));
        }

        let weight_rows = tables.weights.len() / tables.rhs;
        let potential_rows = potentials / tables.rhs;
        for pair in 0..pairs {
            let operands = self.operands(tables, pair);
            if !operands.is_degenerate() {
                operands.validate_shapes()?;
            }
            if operands.weight_map.len() != operands.n()
                || operands.destination_map.len() != operands.m()
            {
                return Err(validation_error(format!(
                    "pair {}: weight or destination list length differs from its point list",
                    pair
                )));
            }
            check_indices("target", operands.target_map, tables.targets.len())?;
            check_indices("source", operands.source_map, tables.sources.len())?;
            check_indices("weight", operands.weight_map, weight_rows)?;
            check_indices("destination", operands.destination_map, potential_rows)?;
        }
        Ok(())
    }
}

/// Sums every pair of `lists` into `potentials`.
pub fn sum_list(
    summator: &Summator,
    kernel: &Kernel<'_>,
    tables: &Tables<'_>,
    lists: &IndexLists<'_>,
    potentials: &mut [f64],
) -> Result<()> {
    lists.validate(tables, potentials.len())?;
    debug!(
        pairs = lists.len(),
        separate_destinations = lists.destinations.is_some(),
        "list summation"
    );

    for pair in 0..lists.len() {
        summator.sum(kernel, &lists.operands(tables, pair), potentials)?;
    }
    Ok(())
}

/// [`sum_list`] with one point table for targets and sources.
pub fn sum_list_symmetric(
    summator: &Summator,
    kernel: &Kernel<'_>,
    points: PointSet<'_>,
    weights: &[f64],
    rhs: usize,
    lists: &IndexLists<'_>,
    potentials: &mut [f64],
) -> Result<()> {
    sum_list(
        summator,
        kernel,
        &Tables::symmetric(points, weights, rhs),
        lists,
        potentials,
    )
}
