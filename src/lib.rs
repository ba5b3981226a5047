//! # sinkdiv
//!
//! Entropic optimal transport divergences between weighted point clouds,
//! in both balanced and unbalanced mass settings.
//!
//! ## The Problem
//!
//! Given two weighted point clouds (discrete measures), compute a smooth,
//! debiased distance between them. The workhorse is the Sinkhorn algorithm:
//! an alternating fixed-point iteration on dual potentials that solves
//! entropic-regularized optimal transport. When the two measures carry
//! different total masses, a marginal divergence (KL, TV, or a boundary
//! penalty) relaxes the hard marginal constraints.
//!
//! ## Key Functions
//!
//! | Function | Use Case |
//! |----------|----------|
//! | [`sinkhorn`] | One entropic OT solve: plan, potentials, dual objective |
//! | [`sinkhorn_with_cost`] | Same, with a caller-supplied cost matrix |
//! | [`sinkhorn_divergence`] | Debiased divergence (cross minus self terms) |
//! | [`mmd`] | Maximum mean discrepancy baseline under the Euclidean cost |
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use sinkdiv::{sinkhorn, sinkhorn_divergence, SinkhornConfig};
//!
//! let x = array![[0.0, 0.0], [1.0, 0.0]];
//! let y = array![[0.0, 1.0], [1.0, 1.0]];
//! let a = array![0.5, 0.5];
//! let b = array![0.5, 0.5];
//!
//! let cfg = SinkhornConfig::default();
//! let sol = sinkhorn(&x, &y, &a, &b, &cfg).unwrap();
//! assert_eq!(sol.plan.dim(), (2, 2));
//!
//! let div = sinkhorn_divergence(&x, &y, &a, &b, &cfg).unwrap();
//! assert!(div >= -1e-6);
//! ```
//!
//! ## Unbalanced Transport
//!
//! With [`MarginalDivergence::Balanced`] the plan's marginals match the
//! input weights exactly (at convergence). The other modes let the plan
//! create or destroy mass at a price:
//!
//! - [`MarginalDivergence::Kl`]: KL penalty on the marginals; mass is
//!   adjusted smoothly toward a compromise between the two totals.
//! - [`MarginalDivergence::Tv`]: total-variation penalty; potentials are
//!   clamped, mass is dropped at a flat rate.
//! - [`MarginalDivergence::Boundary`]: each point may discard its mass to
//!   an absorbing boundary at the cost of its (squared, halved) distance
//!   to the diagonal. This is the persistence-diagram setting.
//!
//! [`Homogeneity`] selects how the two total masses enter the entropic
//! term (plain, harmonic, or geometric normalization).
//!
//! ## What Can Go Wrong
//!
//! 1. **Sinkhorn not converging**: increase `max_steps` or loosen `tol`.
//!    The solver still returns a best-effort result and logs a warning.
//! 2. **Numerical overflow**: large costs with small epsilon overflow the
//!    plain exponential path. Keep `stabilized: true` (the default).
//! 3. **Zero total mass**: a measure with zero mass divides by zero in the
//!    homogeneity normalizations; outputs degrade to NaN rather than panic.
//! 4. **Boundary mode on boundary points**: a point exactly on the diagonal
//!    has zero throwing cost, and `ln(0)` sends its potential to -inf.
//!
//! ## References
//!
//! - Cuturi (2013). "Sinkhorn Distances: Lightspeed Computation of Optimal Transport"
//! - Chizat et al. (2018). "Scaling Algorithms for Unbalanced Optimal Transport Problems"
//! - Feydy et al. (2019). "Interpolating between Optimal Transport and MMD using Sinkhorn Divergences"
//! - Sejourne et al. (2019). "Sinkhorn Divergences for Unbalanced Optimal Transport"

use thiserror::Error;

pub mod divergence;
pub mod geometry;
pub mod modes;
pub mod solver;

pub use divergence::{mmd, sinkhorn_divergence};
pub use geometry::{euclidean_cost_matrix, squared_dist_to_diag};
pub use modes::{Homogeneity, MarginalDivergence, PotentialInit};
pub use solver::{
    estim_dual, sinkhorn, sinkhorn_map, sinkhorn_with_cost, transport_plan, SinkhornConfig,
    SinkhornSolution, Termination,
};

/// Error variants for optimal transport solves.
#[derive(Debug, Error)]
pub enum Error {
    /// Unrecognized marginal divergence mode name.
    #[error("unknown marginal divergence mode: {0:?}")]
    UnknownDivergence(String),

    /// Unrecognized homogeneity mode name.
    #[error("unknown homogeneity mode: {0:?}")]
    UnknownHomogeneity(String),

    /// Weight vectors have different lengths than expected.
    #[error("lengths differ: {0} vs {1}")]
    LengthMismatch(usize, usize),

    /// Cost matrix shape mismatch.
    #[error("cost matrix shape mismatch: expected ({0}, {1}), got ({2}, {3})")]
    CostShapeMismatch(usize, usize, usize, usize),

    /// Invalid entropic regularization parameter.
    #[error("regularization parameter must be positive and finite, got {0}")]
    InvalidRegularization(f64),

    /// Domain error (invalid inputs for the mathematical definition).
    #[error("{0}")]
    Domain(&'static str),
}

/// Result type for optimal transport operations.
pub type Result<T> = std::result::Result<T, Error>;
