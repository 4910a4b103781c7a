//! Kernel types, their auxiliary-data requirements and elementwise transforms.
//!
//! A [`Kernel`] is what the caller describes. Before any buffer is allocated it
//! is resolved against the point dimension into a [`ResolvedKernel`], which
//! carries the derived hyperparameters (Laplace scale and power) and the
//! [`KernelTraits`] that tell the packing stage which auxiliary scalars it has
//! to gather.
//!
//! Each kernel's transform lives in [`transform`] as a zero-sized type so the
//! micro-kernels can be monomorphized per kernel and selected once per call.

use std::f64::consts::PI;
use std::fmt;

use statrs::function::gamma::gamma;

use crate::error::{GsksError, Result};

/// Squared distances at or below this value are treated as coincident points
/// by the Laplace kernel.
pub const LAPLACE_EPS: f64 = 1e-15;

/// Replacement distance for coincident points under the Laplace kernel. Raised
/// to the (negative) Laplace power it contributes a numerically zero value.
pub const LAPLACE_DMAX: f64 = 1.79e308;

/// The fixed set of supported kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// `exp(scale * d)`
    Gaussian,
    /// `exp(d * h_source)` with a per-source bandwidth.
    GaussianVariableBandwidth,
    /// `(scale * <a,b> + offset) ^ power`
    Polynomial,
    /// Fundamental solution of the Laplace equation in `k > 2` dimensions.
    Laplace,
    /// `tanh(scale * <a,b> + offset)`
    Tanh,
    /// `(15/16) (1 - d)^2` inside the unit ball.
    Quartic,
    /// `d + offset`
    Multiquadratic,
    /// `(3/4) (1 - d)` inside the unit ball.
    Epanechnikov,
}

/// Auxiliary data a kernel needs besides the raw inner products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelTraits {
    /// Squared norms of targets and sources (distance-based kernels).
    pub needs_sq_norm: bool,
    /// Per-point bandwidths of targets and sources.
    pub needs_bandwidth: bool,
}

const fn traits(needs_sq_norm: bool, needs_bandwidth: bool) -> KernelTraits {
    KernelTraits {
        needs_sq_norm,
        needs_bandwidth,
    }
}

/// Indexed by `KernelKind as usize`.
const KERNEL_TABLE: [KernelTraits; 8] = [
    traits(true, false),  // Gaussian
    traits(true, true),   // GaussianVariableBandwidth
    traits(false, false), // Polynomial
    traits(true, false),  // Laplace
    traits(false, false), // Tanh
    traits(true, false),  // Quartic
    traits(true, false),  // Multiquadratic
    traits(true, false),  // Epanechnikov
];

impl KernelKind {
    /// All kernels, in tag order.
    pub const ALL: [KernelKind; 8] = [
        KernelKind::Gaussian,
        KernelKind::GaussianVariableBandwidth,
        KernelKind::Polynomial,
        KernelKind::Laplace,
        KernelKind::Tanh,
        KernelKind::Quartic,
        KernelKind::Multiquadratic,
        KernelKind::Epanechnikov,
    ];

    /// Maps an integer kernel tag to its kind.
    pub fn from_tag(tag: u32) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(GsksError::UnknownKernel { tag })
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn traits(self) -> KernelTraits {
        KERNEL_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            KernelKind::Gaussian => "gaussian",
            KernelKind::GaussianVariableBandwidth => "gaussian-variable-bandwidth",
            KernelKind::Polynomial => "polynomial",
            KernelKind::Laplace => "laplace",
            KernelKind::Tanh => "tanh",
            KernelKind::Quartic => "quartic",
            KernelKind::Multiquadratic => "multiquadratic",
            KernelKind::Epanechnikov => "epanechnikov",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-point bandwidths, indexed like the target and source point tables.
#[derive(Debug, Clone, Copy)]
pub struct Bandwidth<'a> {
    pub target: &'a [f64],
    pub source: &'a [f64],
}

/// A kernel as described by the caller.
///
/// `scale`, `offset` and `power` are interpreted per kernel (see
/// [`KernelKind`]); unused fields are ignored. The Laplace scale and power are
/// derived from the dimension at resolve time and the given values ignored.
#[derive(Debug, Clone, Copy)]
pub struct Kernel<'a> {
    pub kind: KernelKind,
    pub scale: f64,
    pub offset: f64,
    pub power: f64,
    pub bandwidth: Option<Bandwidth<'a>>,
}

impl<'a> Kernel<'a> {
    /// A kernel of `kind` with `scale = 1`, `offset = 0`, `power = 1` and no
    /// bandwidths. Use the named constructors to set the hyperparameters.
    pub fn new(kind: KernelKind) -> Self {
        Self {
            kind,
            scale: 1.0,
            offset: 0.0,
            power: 1.0,
            bandwidth: None,
        }
    }

    /// Builds a kernel from an integer tag, as used by tag-based front-ends.
    pub fn from_tag(tag: u32) -> Result<Self> {
        KernelKind::from_tag(tag).map(Self::new)
    }

    /// `exp(scale * ||a - b||^2)`; `scale` is usually `-1 / (2 h^2)`.
    pub fn gaussian(scale: f64) -> Self {
        Self {
            scale,
            ..Self::new(KernelKind::Gaussian)
        }
    }

    /// `exp(||a - b||^2 * h_source)` with bandwidths given per point.
    pub fn gaussian_variable_bandwidth(target: &'a [f64], source: &'a [f64]) -> Self {
        Self {
            bandwidth: Some(Bandwidth { target, source }),
            ..Self::new(KernelKind::GaussianVariableBandwidth)
        }
    }

    /// `(scale * <a, b> + offset)^power`.
    ///
    /// # Arguments
    ///
    /// * `scale` - Multiplier of the inner product.
    /// * `offset` - Constant added before the power.
    /// * `power` - Exponent. `2` and `4` are evaluated by repeated squaring,
    ///   any other value through `powf`.
    pub fn polynomial(scale: f64, offset: f64, power: f64) -> Self {
        Self {
            scale,
            offset,
            power,
            ..Self::new(KernelKind::Polynomial)
        }
    }

    /// Green's function of the Laplacian in `k > 2` dimensions,
    /// `Γ(k/2 + 1) / (k (k - 2) π^(k/2)) * ||a - b||^(2 - k)`.
    ///
    /// Coincident points contribute (numerically) nothing. The scale and
    /// power are derived from the dimension when the kernel is resolved.
    pub fn laplace() -> Self {
        Self::new(KernelKind::Laplace)
    }

    /// `tanh(scale * <a, b> + offset)`.
    ///
    /// # Arguments
    ///
    /// * `scale` - Multiplier of the inner product.
    /// * `offset` - Constant added inside the hyperbolic tangent.
    pub fn tanh(scale: f64, offset: f64) -> Self {
        Self {
            scale,
            offset,
            ..Self::new(KernelKind::Tanh)
        }
    }

    /// `15/16 * (1 - ||a - b||^2)^2` inside the unit ball, `0` outside.
    pub fn quartic() -> Self {
        Self::new(KernelKind::Quartic)
    }

    /// `||a - b||^2 + offset`.
    pub fn multiquadratic(offset: f64) -> Self {
        Self {
            offset,
            ..Self::new(KernelKind::Multiquadratic)
        }
    }

    /// `3/4 * (1 - ||a - b||^2)` inside the unit ball, `0` outside.
    pub fn epanechnikov() -> Self {
        Self::new(KernelKind::Epanechnikov)
    }

    /// Validates the kernel for dimension `dim` and derives its parameters.
    pub fn resolve(&self, dim: usize) -> Result<ResolvedKernel> {
        let traits = self.kind.traits();
        let mut params = KernelParams {
            scale: self.scale,
            offset: self.offset,
            power: self.power,
        };

        match self.kind {
            KernelKind::Laplace => {
                if dim <= 2 {
                    return Err(GsksError::LaplaceDimension { dim });
                }
                let k = dim as f64;
                params.power = 0.5 * (2.0 - k);
                params.scale = gamma(0.5 * k + 1.0) / (k * (k - 2.0) * PI.powf(0.5 * k));
            }
            KernelKind::GaussianVariableBandwidth if self.bandwidth.is_none() => {
                return Err(GsksError::MissingBandwidth);
            }
            _ => {}
        }

        Ok(ResolvedKernel {
            kind: self.kind,
            traits,
            params,
        })
    }
}

/// Scalar hyperparameters after derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub scale: f64,
    pub offset: f64,
    pub power: f64,
}

/// A validated kernel, immutable for the duration of a call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedKernel {
    pub kind: KernelKind,
    pub traits: KernelTraits,
    pub params: KernelParams,
}

impl ResolvedKernel {
    /// Evaluates the kernel for one pair from its raw inner product `inner`,
    /// the squared norms `a2`, `b2` and the source bandwidth `h_source`.
    ///
    /// Dispatches on the kind for every pair; the blocked path goes through
    /// the monomorphized [`Transform`] implementations instead.
    pub fn evaluate(&self, inner: f64, a2: f64, b2: f64, h_source: f64) -> f64 {
        use transform::*;
        let p = &self.params;
        match self.kind {
            KernelKind::Gaussian => Gaussian::apply(p, inner, a2, b2, h_source),
            KernelKind::GaussianVariableBandwidth => {
                VariableBandwidth::apply(p, inner, a2, b2, h_source)
            }
            KernelKind::Polynomial => Polynomial::apply(p, inner, a2, b2, h_source),
            KernelKind::Laplace => Laplace::apply(p, inner, a2, b2, h_source),
            KernelKind::Tanh => Tanh::apply(p, inner, a2, b2, h_source),
            KernelKind::Quartic => Quartic::apply(p, inner, a2, b2, h_source),
            KernelKind::Multiquadratic => Multiquadratic::apply(p, inner, a2, b2, h_source),
            KernelKind::Epanechnikov => Epanechnikov::apply(p, inner, a2, b2, h_source),
        }
    }
}

/// Assembles `||a - b||^2` from the inner product and the squared norms.
#[inline(always)]
pub fn squared_distance(inner: f64, a2: f64, b2: f64) -> f64 {
    (-2.0 * inner + a2) + b2
}

/// Elementwise kernel transform applied to one rank-k result.
pub trait Transform: Send + Sync + 'static {
    const KIND: KernelKind;

    fn apply(params: &KernelParams, inner: f64, a2: f64, b2: f64, h_source: f64) -> f64;
}

pub mod transform {
    use super::*;

    pub struct Gaussian;
    pub struct VariableBandwidth;
    pub struct Polynomial;
    pub struct Laplace;
    pub struct Tanh;
    pub struct Quartic;
    pub struct Multiquadratic;
    pub struct Epanechnikov;

    impl Transform for Gaussian {
        const KIND: KernelKind = KernelKind::Gaussian;

        #[inline(always)]
        fn apply(p: &KernelParams, inner: f64, a2: f64, b2: f64, _h: f64) -> f64 {
            (p.scale * squared_distance(inner, a2, b2)).exp()
        }
    }

    impl Transform for VariableBandwidth {
        const KIND: KernelKind = KernelKind::GaussianVariableBandwidth;

        #[inline(always)]
        fn apply(_p: &KernelParams, inner: f64, a2: f64, b2: f64, h: f64) -> f64 {
            (squared_distance(inner, a2, b2) * h).exp()
        }
    }

    impl Transform for Polynomial {
        const KIND: KernelKind = KernelKind::Polynomial;

        #[inline(always)]
        fn apply(p: &KernelParams, inner: f64, _a2: f64, _b2: f64, _h: f64) -> f64 {
            let x = p.scale * inner + p.offset;
            if p.power == 2.0 {
                x * x
            } else if p.power == 4.0 {
                let x2 = x * x;
                x2 * x2
            } else {
                x.powf(p.power)
            }
        }
    }

    impl Transform for Laplace {
        const KIND: KernelKind = KernelKind::Laplace;

        #[inline(always)]
        fn apply(p: &KernelParams, inner: f64, a2: f64, b2: f64, _h: f64) -> f64 {
            let d = squared_distance(inner, a2, b2);
            // d <- max(d, eps); a clamped distance is a coincident pair
            let d = if d <= LAPLACE_EPS { LAPLACE_DMAX } else { d };
            p.scale * d.powf(p.power)
        }
    }

    impl Transform for Tanh {
        const KIND: KernelKind = KernelKind::Tanh;

        #[inline(always)]
        fn apply(p: &KernelParams, inner: f64, _a2: f64, _b2: f64, _h: f64) -> f64 {
            (p.scale * inner + p.offset).tanh()
        }
    }

    impl Transform for Quartic {
        const KIND: KernelKind = KernelKind::Quartic;

        #[inline(always)]
        fn apply(_p: &KernelParams, inner: f64, a2: f64, b2: f64, _h: f64) -> f64 {
            let d = squared_distance(inner, a2, b2);
            if d < 1.0 {
                let t = 1.0 - d;
                (15.0 / 16.0) * t * t
            } else {
                0.0
            }
        }
    }

    impl Transform for Multiquadratic {
        const KIND: KernelKind = KernelKind::Multiquadratic;

        #[inline(always)]
        fn apply(p: &KernelParams, inner: f64, a2: f64, b2: f64, _h: f64) -> f64 {
            squared_distance(inner, a2, b2) + p.offset
        }
    }

    impl Transform for Epanechnikov {
        const KIND: KernelKind = KernelKind::Epanechnikov;

        #[inline(always)]
        fn apply(_p: &KernelParams, inner: f64, a2: f64, b2: f64, _h: f64) -> f64 {
            let d = squared_distance(inner, a2, b2);
            if d < 1.0 {
                (3.0 / 4.0) * (1.0 - d)
            } else {
                0.0
            }
        }
    }
}
