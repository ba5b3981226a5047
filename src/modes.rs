//! Marginal divergence and homogeneity policies.
//!
//! Each mode is a closed enum variant carrying its own proximal operator,
//! convex conjugate, and weight normalization. Modes are resolved once at
//! configuration time; an unknown mode name fails in [`from_name`] rather
//! than deep inside the solver loop.
//!
//! [`from_name`]: MarginalDivergence::from_name

use crate::{Error, Result};
use ndarray::Array1;

/// Divergence penalizing the transport plan's marginal deviation.
///
/// Balanced transport pins the marginals exactly. The unbalanced modes
/// replace the hard constraint with a penalty whose proximal operator
/// ([`aprox`]) and convex conjugate ([`varphi_star`]) appear in the dual
/// update and the dual objective respectively. The two must always be
/// used with the same mode; they are kept together here for that reason.
///
/// [`aprox`]: MarginalDivergence::aprox
/// [`varphi_star`]: MarginalDivergence::varphi_star
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginalDivergence {
    /// Hard marginal constraints (classic balanced OT).
    Balanced,
    /// Kullback-Leibler penalty on the marginals.
    Kl,
    /// Total-variation penalty on the marginals.
    Tv,
    /// Absorbing-boundary penalty: mass may be discarded at the cost of
    /// its distance to the diagonal (persistence-diagram transport).
    Boundary,
}

impl MarginalDivergence {
    /// Resolve a mode from its reference name.
    ///
    /// Accepted names: `"balanced"`, `"KL"`, `"TV"`, `"boundary"`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "balanced" => Ok(Self::Balanced),
            "KL" => Ok(Self::Kl),
            "TV" => Ok(Self::Tv),
            "boundary" => Ok(Self::Boundary),
            _ => Err(Error::UnknownDivergence(name.to_string())),
        }
    }

    /// Canonical name of the mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Kl => "KL",
            Self::Tv => "TV",
            Self::Boundary => "boundary",
        }
    }

    /// Anisotropic proximal operator, applied element-wise to the
    /// LogSumExp output of the Sinkhorn update.
    ///
    /// - Balanced: identity.
    /// - KL: `x / (1 + eps)`.
    /// - TV: clamp to `[-1, 1]`.
    /// - Boundary: `max(-cdiag, x + eps * ln(cdiag))`.
    ///
    /// # Panics
    ///
    /// Boundary mode panics if `cdiag` is `None` or has a length other
    /// than `x.len()`. The solver always supplies it.
    pub fn aprox(&self, x: &Array1<f64>, eps: f64, cdiag: Option<&Array1<f64>>) -> Array1<f64> {
        match self {
            Self::Balanced => x.clone(),
            Self::Kl => x / (1.0 + eps),
            Self::Tv => x.mapv(|v| v.clamp(-1.0, 1.0)),
            Self::Boundary => {
                let c = cdiag.expect("boundary mode needs a boundary-distance vector");
                assert_eq!(c.len(), x.len(), "boundary-distance length mismatch");
                let mut out = Array1::zeros(x.len());
                for i in 0..x.len() {
                    out[i] = (x[i] + eps * c[i].ln()).max(-c[i]);
                }
                out
            }
        }
    }

    /// Convex conjugate of the divergence, applied element-wise.
    /// Used only in the dual objective estimation.
    ///
    /// - Balanced: identity.
    /// - KL: `exp(q) - 1`.
    /// - TV: `max(-1, q)`.
    /// - Boundary: `max(-1, q / cdiag)`.
    ///
    /// # Panics
    ///
    /// Boundary mode panics if `cdiag` is `None` or has a length other
    /// than `q.len()`.
    pub fn varphi_star(&self, q: &Array1<f64>, cdiag: Option<&Array1<f64>>) -> Array1<f64> {
        match self {
            Self::Balanced => q.clone(),
            Self::Kl => q.mapv(|v| v.exp() - 1.0),
            Self::Tv => q.mapv(|v| v.max(-1.0)),
            Self::Boundary => {
                let c = cdiag.expect("boundary mode needs a boundary-distance vector");
                assert_eq!(c.len(), q.len(), "boundary-distance length mismatch");
                let mut out = Array1::zeros(q.len());
                for i in 0..q.len() {
                    out[i] = (q[i] / c[i]).max(-1.0);
                }
                out
            }
        }
    }
}

/// Normalization scheme controlling how the total masses of the two
/// measures enter the entropic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Homogeneity {
    /// No mass normalization.
    Std,
    /// Harmonic-mean normalization of the masses.
    Harmonic,
    /// Geometric-mean normalization of the masses.
    Geometric,
}

impl Homogeneity {
    /// Resolve a mode from its reference name.
    ///
    /// Accepted names: `"std"`, `"harmonic"`, `"geometric"`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "std" => Ok(Self::Std),
            "harmonic" => Ok(Self::Harmonic),
            "geometric" => Ok(Self::Geometric),
            _ => Err(Error::UnknownHomogeneity(name.to_string())),
        }
    }

    /// Canonical name of the mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Harmonic => "harmonic",
            Self::Geometric => "geometric",
        }
    }

    /// Renormalize `a` before it enters the weighted LogSumExp.
    ///
    /// The Sinkhorn inner loop processes `a * X/Y`, where `X` is the
    /// renormalization from the homogeneity choice and `Y` the one from
    /// marginal correction. For the supported combinations the ratio
    /// collapses to a single division:
    ///
    /// - Std: `a` unchanged.
    /// - Harmonic/Geometric, uncorrected: `a / sqrt(mass(a) * mass(b))`.
    /// - Harmonic/Geometric, corrected: `a / mass(a)`.
    pub fn normalized_weights(
        &self,
        a: &Array1<f64>,
        b: &Array1<f64>,
        corrected_marginals: bool,
    ) -> Array1<f64> {
        match self {
            Self::Std => a.clone(),
            Self::Harmonic | Self::Geometric => {
                if corrected_marginals {
                    a / a.sum()
                } else {
                    a / (a.sum() * b.sum()).sqrt()
                }
            }
        }
    }
}

/// Initialization of the dual potentials at the start of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PotentialInit {
    /// All-ones vectors.
    #[default]
    Unif,
    /// Uniform-random vectors in `[0, 1)`.
    Rand,
}

impl PotentialInit {
    /// Resolve an initialization from its reference name.
    ///
    /// Unknown names fall back to [`PotentialInit::Rand`] with a logged
    /// warning; this is a non-fatal condition.
    pub fn from_name(name: &str) -> Self {
        match name {
            "unif" => Self::Unif,
            "rand" => Self::Rand,
            _ => {
                log::warn!("unknown potential init {name:?}, falling back to rand");
                Self::Rand
            }
        }
    }
}
