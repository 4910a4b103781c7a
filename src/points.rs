//! Borrowed coordinate tables and index-map validation.

use ndarray::ArrayView2;

use crate::error::{validation_error, GsksError, Result};

/// A `dim`-dimensional coordinate table.
///
/// Point `p` occupies `coords[p * dim..(p + 1) * dim]`. The optional
/// squared-norm table holds `||x_p||^2` per point; when it is absent the norm
/// is computed from the coordinates whenever a distance kernel asks for it.
#[derive(Debug, Clone, Copy)]
pub struct PointSet<'a> {
    coords: &'a [f64],
    dim: usize,
    len: usize,
    sq_norms: Option<&'a [f64]>,
}

impl<'a> PointSet<'a> {
    pub fn new(coords: &'a [f64], dim: usize) -> Result<Self> {
        if dim == 0 {
            if !coords.is_empty() {
                return Err(validation_error(
                    "zero-dimensional point set must have an empty coordinate table",
                ));
            }
            return Ok(Self {
                coords,
                dim,
                len: 0,
                sq_norms: None,
            });
        }
        if coords.len() % dim != 0 {
            return Err(validation_error(format!(
                "coordinate table of length {} is not a multiple of dimension {}",
                coords.len(),
                dim
            )));
        }
        Ok(Self {
            coords,
            dim,
            len: coords.len() / dim,
            sq_norms: None,
        })
    }

    /// Builds a point set from a row-per-point array in standard layout.
    pub fn from_array(points: ArrayView2<'a, f64>) -> Result<Self> {
        let dim = points.ncols();
        let rows = points.nrows();
        let coords = points
            .to_slice()
            .ok_or_else(|| validation_error("point array must be contiguous and row-major"))?;
        if dim == 0 {
            // ndarray reports an empty slice for n x 0 arrays; keep the row count.
            return Ok(Self {
                coords,
                dim,
                len: rows,
                sq_norms: None,
            });
        }
        Self::new(coords, dim)
    }

    /// Attaches a precomputed squared-norm table, one entry per point.
    pub fn with_squared_norms(mut self, sq_norms: &'a [f64]) -> Result<Self> {
        if sq_norms.len() != self.len {
            return Err(validation_error(format!(
                "squared-norm table has {} entries for {} points",
                sq_norms.len(),
                self.len
            )));
        }
        self.sq_norms = Some(sq_norms);
        Ok(self)
    }

    #[inline(always)]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn coords(&self) -> &'a [f64] {
        self.coords
    }

    pub fn sq_norms(&self) -> Option<&'a [f64]> {
        self.sq_norms
    }

    /// Coordinates of point `p`.
    #[inline(always)]
    pub fn point(&self, p: usize) -> &'a [f64] {
        &self.coords[p * self.dim..(p + 1) * self.dim]
    }

    /// `||x_p||^2`, from the attached table or summed in coordinate order.
    #[inline]
    pub fn squared_norm(&self, p: usize) -> f64 {
        match self.sq_norms {
            Some(norms) => norms[p],
            None => {
                let mut sum = 0.0;
                for &x in self.point(p) {
                    sum += x * x;
                }
                sum
            }
        }
    }
}

/// Checks that every entry of `map` addresses one of `len` rows.
pub(crate) fn check_indices(name: &'static str, map: &[usize], len: usize) -> Result<()> {
    match map.iter().position(|&index| index >= len) {
        Some(position) => Err(GsksError::IndexOutOfBounds {
            map: name,
            position,
            index: map[position],
            len,
        }),
        None => Ok(()),
    }
}
