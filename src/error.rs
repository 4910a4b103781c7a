//! Error types for kernel summation.
//!
//! Every condition the summation engine refuses to compute is reported through
//! [`GsksError`] before any scratch buffer is allocated, so a failed call never
//! touches the potential table.

use thiserror::Error;

/// Errors that can occur while configuring or running a kernel summation.
#[derive(Debug, Error)]
pub enum GsksError {
    /// An integer kernel tag outside the supported enumeration.
    #[error("Unknown kernel type tag: {tag}")]
    UnknownKernel {
        /// The rejected tag.
        tag: u32,
    },

    /// The Laplace kernel is only defined for dimensions greater than two.
    #[error("Laplace kernel requires dimension > 2 (got {dim})")]
    LaplaceDimension {
        /// Point dimension of the rejected call.
        dim: usize,
    },

    /// The variable-bandwidth kernel was requested without bandwidth vectors.
    #[error("Variable-bandwidth kernel requires target and source bandwidth vectors")]
    MissingBandwidth,

    /// An index map names a row that does not exist in its backing table.
    #[error("Index out of bounds in {map} map at position {position}: index {index} >= {len}")]
    IndexOutOfBounds {
        /// Which map held the bad entry.
        map: &'static str,
        /// Position of the entry inside the map.
        position: usize,
        /// The offending index.
        index: usize,
        /// Number of rows in the backing table.
        len: usize,
    },

    /// Inconsistent shapes or lengths of the call's inputs.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid blocking or threading configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// A scratch panel could not be reserved.
    #[error("Memory allocation failed (requested {requested_size} bytes)")]
    Allocation {
        /// The size that was requested to be allocated.
        requested_size: usize,
    },

    /// The worker pool could not be started.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type alias for kernel summation operations.
pub type Result<T> = std::result::Result<T, GsksError>;

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> GsksError {
    GsksError::Validation {
        message: message.into(),
    }
}

/// Creates a configuration error.
pub fn config_error(message: impl Into<String>) -> GsksError {
    GsksError::Config {
        message: message.into(),
    }
}

/// Allocates a zero-filled scratch buffer, reporting failure instead of aborting.
pub(crate) fn zeroed_panel(len: usize) -> Result<Vec<f64>> {
    let mut panel = Vec::new();
    panel
        .try_reserve_exact(len)
        .map_err(|_| GsksError::Allocation {
            requested_size: len.saturating_mul(std::mem::size_of::<f64>()),
        })?;
    panel.resize(len, 0.0);
    Ok(panel)
}
