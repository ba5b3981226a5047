//! Log-domain Sinkhorn solver for entropic optimal transport.
//!
//! One solve runs the alternating dual-potential fixed point
//!
//! ```text
//! f <- -aprox(-(-eps * LSE_a((g - C^T) / eps)))
//! g <- -aprox(-(-eps * LSE_b((f - C)   / eps)))
//! ```
//!
//! where `LSE_w` is a weighted log-sum-exp over the opposite measure and
//! `aprox` is the proximal operator of the configured marginal divergence.
//! The dual objective is re-estimated after each sweep and its relative
//! change is the stopping criterion. At termination the transport plan is
//! reconstructed from the final potentials.

use crate::geometry::{euclidean_cost_matrix, squared_dist_to_diag};
use crate::modes::{Homogeneity, MarginalDivergence, PotentialInit};
use crate::{Error, Result};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Configuration of one Sinkhorn solve.
///
/// Held constant through all iterations; a solve is fully reproducible
/// from its configuration and inputs (random initialization is seeded).
#[derive(Debug, Clone)]
pub struct SinkhornConfig {
    /// Divergence penalizing marginal deviation.
    pub divergence: MarginalDivergence,
    /// Mass-normalization model for the entropic term.
    pub homogeneity: Homogeneity,
    /// Apply the mass-ratio correction to the marginals in the dual
    /// objective. Independent from the homogeneity normalization even
    /// though the two interact; see [`estim_dual`].
    pub corrected_marginals: bool,
    /// Entropic regularization strength. Must be positive and finite.
    pub epsilon: f64,
    /// Subtract the per-column max inside the log-sum-exp. Keep on unless
    /// benchmarking the difference; the plain path overflows for small
    /// `epsilon` relative to the cost magnitudes.
    pub stabilized: bool,
    /// Step budget for the fixed-point loop.
    pub max_steps: usize,
    /// Relative-change stopping criterion on the dual objective. `0.0`
    /// means "run the full budget" and suppresses the non-convergence
    /// warning.
    pub tol: f64,
    /// Dual potential initialization.
    pub init: PotentialInit,
    /// Seed for random initialization (deterministic by default).
    pub seed: u64,
    /// Include the entropic correction term in the dual objective.
    pub with_entropy: bool,
    /// Diagnostic verbosity: 0 silent, 1 convergence summary, 2 per-step
    /// objective trace.
    pub verbose: u8,
}

impl Default for SinkhornConfig {
    fn default() -> Self {
        Self {
            divergence: MarginalDivergence::Balanced,
            homogeneity: Homogeneity::Std,
            corrected_marginals: false,
            epsilon: 0.1,
            stabilized: true,
            max_steps: 1_000,
            tol: 1e-4,
            init: PotentialInit::Unif,
            seed: 42,
            with_entropy: true,
            verbose: 1,
        }
    }
}

/// How a solve terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The relative-change criterion was met at this step index.
    Converged {
        /// Zero-based step at which the criterion was first satisfied.
        steps: usize,
    },
    /// The step budget ran out first. The solution is still usable.
    ExhaustedSteps,
}

impl Termination {
    /// Whether the stopping criterion was met within the budget.
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged { .. })
    }
}

/// Output of one Sinkhorn solve.
#[derive(Debug, Clone)]
pub struct SinkhornSolution {
    /// Transport plan, shape `(n, m)`.
    pub plan: Array2<f64>,
    /// Final dual potential on the first measure.
    pub f: Array1<f64>,
    /// Final dual potential on the second measure.
    pub g: Array1<f64>,
    /// Final dual objective value.
    pub objective: f64,
    /// Convergence status.
    pub termination: Termination,
}

/// Weighted log-sum-exp `ln(sum_i w_i * exp(h_i))` with max subtraction.
///
/// Returns `-inf` if `len == 0` and propagates a non-finite max.
fn weighted_logsumexp_by(
    len: usize,
    mut h: impl FnMut(usize) -> f64,
    mut w: impl FnMut(usize) -> f64,
) -> f64 {
    if len == 0 {
        return f64::NEG_INFINITY;
    }

    let mut max_val = f64::NEG_INFINITY;
    for i in 0..len {
        max_val = max_val.max(h(i));
    }
    if !max_val.is_finite() {
        return max_val;
    }

    let mut sum_exp = 0.0;
    for i in 0..len {
        sum_exp += (h(i) - max_val).exp() * w(i);
    }
    max_val + sum_exp.ln()
}

/// One half-step of the Sinkhorn fixed point: update the potential of the
/// measure on the *columns* of `cost` from the potential `f` of the
/// measure on the *rows*.
///
/// `a` are the (possibly pre-weighted) row-side weights, `b` the opposite
/// weights, read only for the non-std homogeneity normalization. `cdiag`
/// is the boundary-distance vector of the column-side measure, required
/// in boundary mode. With `cfg.stabilized` off the exponentials are taken
/// directly; this overflows when `epsilon` is small relative to the
/// costs.
///
/// Pure: no side effects, same-length output as `cost.ncols()`.
pub fn sinkhorn_map(
    f: &Array1<f64>,
    a: &Array1<f64>,
    cost: &ArrayView2<f64>,
    cdiag: Option<&Array1<f64>>,
    b: &Array1<f64>,
    cfg: &SinkhornConfig,
) -> Array1<f64> {
    let n_src = cost.nrows();
    let n_dst = cost.ncols();
    debug_assert_eq!(f.len(), n_src);
    debug_assert_eq!(a.len(), n_src);

    let eps = cfg.epsilon;
    let a_norm = cfg
        .homogeneity
        .normalized_weights(a, b, cfg.corrected_marginals);

    let mut res = Array1::zeros(n_dst);
    for j in 0..n_dst {
        let lse = if cfg.stabilized {
            weighted_logsumexp_by(
                n_src,
                |i| (f[i] - cost[[i, j]]) / eps,
                |i| a_norm[i],
            )
        } else {
            let mut sum_exp = 0.0;
            for i in 0..n_src {
                sum_exp += ((f[i] - cost[[i, j]]) / eps).exp() * a_norm[i];
            }
            sum_exp.ln()
        };
        res[j] = -eps * lse;
    }

    // The sign flips keep the proximal operator acting in its intended
    // direction.
    cfg.divergence
        .aprox(&res.mapv(|v| -v), eps, cdiag)
        .mapv(|v| -v)
}

/// Dual objective estimate from both potentials:
///
/// ```text
/// z = <-varphi_star(-f), a'> + <-varphi_star(-g), b'>  [- eps * entropic term]
/// ```
///
/// With `cfg.corrected_marginals` the weights are rescaled by
/// `sqrt(mass(a)/mass(b))` and its reciprocal at evaluation time only.
/// The entropic term depends on the homogeneity mode:
///
/// - std: `sum((exp((f+g-C)/eps) - 1) * a x b)`
/// - harmonic: `sum((exp(..)/sqrt(ma*mb) - (1/ma + 1/mb)/2) * a x b)`
/// - geometric: `sum((exp(..) - 1) * a x b / sqrt(ma*mb))`
#[allow(clippy::too_many_arguments)]
pub fn estim_dual(
    f: &Array1<f64>,
    g: &Array1<f64>,
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    cdiag1: Option<&Array1<f64>>,
    cdiag2: Option<&Array1<f64>>,
    cfg: &SinkhornConfig,
) -> f64 {
    let ma = a.sum();
    let mb = b.sum();
    let r_ab = (ma / mb).sqrt();

    let phi_f = cfg.divergence.varphi_star(&f.mapv(|v| -v), cdiag1);
    let phi_g = cfg.divergence.varphi_star(&g.mapv(|v| -v), cdiag2);

    let (wa, wb) = if cfg.corrected_marginals {
        (r_ab, 1.0 / r_ab)
    } else {
        (1.0, 1.0)
    };
    let mut z = 0.0;
    for i in 0..a.len() {
        z += -phi_f[i] * a[i] * wa;
    }
    for j in 0..b.len() {
        z += -phi_g[j] * b[j] * wb;
    }

    if !cfg.with_entropy {
        return z;
    }

    let m_g = (ma * mb).sqrt();
    let m_h_inv = 0.5 * (1.0 / ma + 1.0 / mb);

    let mut entropic = 0.0;
    for i in 0..a.len() {
        for j in 0..b.len() {
            let t = ((f[i] + g[j] - cost[[i, j]]) / cfg.epsilon).exp();
            let (term, weight) = match cfg.homogeneity {
                Homogeneity::Std => (t - 1.0, a[i] * b[j]),
                Homogeneity::Harmonic => (t / m_g - m_h_inv, a[i] * b[j]),
                Homogeneity::Geometric => (t - 1.0, a[i] * b[j] / m_g),
            };
            entropic += term * weight;
        }
    }

    z - cfg.epsilon * entropic
}

/// Primal reconstruction from the final potentials:
///
/// ```text
/// P[i,j] = exp((f[i] + g[j] - C[i,j]) / eps) * a[i] * b[j]
/// ```
///
/// divided by `sqrt(mass(a) * mass(b))` for the harmonic and geometric
/// homogeneity modes.
pub fn transport_plan(
    f: &Array1<f64>,
    g: &Array1<f64>,
    a: &Array1<f64>,
    b: &Array1<f64>,
    eps: f64,
    cost: &Array2<f64>,
    homogeneity: Homogeneity,
) -> Array2<f64> {
    let scale = match homogeneity {
        Homogeneity::Std => 1.0,
        Homogeneity::Harmonic | Homogeneity::Geometric => (a.sum() * b.sum()).sqrt(),
    };

    let mut plan = Array2::zeros((a.len(), b.len()));
    for i in 0..a.len() {
        for j in 0..b.len() {
            plan[[i, j]] =
                ((f[i] + g[j] - cost[[i, j]]) / eps).exp() * a[i] * b[j] / scale;
        }
    }
    plan
}

/// Run the Sinkhorn loop between two point clouds.
///
/// Builds the Euclidean cost matrix, and in boundary mode the
/// boundary-distance vectors plus the cdiag-reweighted masses, then
/// defers to [`sinkhorn_with_cost`].
pub fn sinkhorn(
    x: &Array2<f64>,
    y: &Array2<f64>,
    a: &Array1<f64>,
    b: &Array1<f64>,
    cfg: &SinkhornConfig,
) -> Result<SinkhornSolution> {
    if x.nrows() != a.len() {
        return Err(Error::LengthMismatch(x.nrows(), a.len()));
    }
    if y.nrows() != b.len() {
        return Err(Error::LengthMismatch(y.nrows(), b.len()));
    }
    if x.ncols() != y.ncols() {
        return Err(Error::Domain("point dimensions must match"));
    }

    let cost = euclidean_cost_matrix(x, y);

    if cfg.divergence == MarginalDivergence::Boundary {
        if x.ncols() != 2 {
            return Err(Error::Domain("boundary mode requires 2-D points"));
        }
        let cdiag1 = squared_dist_to_diag(x);
        let cdiag2 = squared_dist_to_diag(y);
        sinkhorn_with_cost(a, b, &cost, Some(&cdiag1), Some(&cdiag2), cfg)
    } else {
        sinkhorn_with_cost(a, b, &cost, None, None, cfg)
    }
}

/// Run the Sinkhorn loop on a caller-supplied cost matrix.
///
/// `cost` must have shape `(a.len(), b.len())`. Boundary mode requires
/// both boundary-distance vectors; the input weights are multiplied by
/// them before the loop, matching the boundary transport model. Other
/// modes ignore the vectors.
///
/// The loop is a Gauss-Seidel sweep: `f` is updated from `g`, then `g`
/// from the *new* `f`. After each sweep the dual objective is
/// re-estimated and `|Δe / e| < tol` stops the iteration. Exhausting the
/// budget is not an error; the best-effort solution is returned and a
/// warning is logged (unless `tol == 0`, which means the full budget is
/// intended).
pub fn sinkhorn_with_cost(
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
    cdiag_a: Option<&Array1<f64>>,
    cdiag_b: Option<&Array1<f64>>,
    cfg: &SinkhornConfig,
) -> Result<SinkhornSolution> {
    let n = a.len();
    let m = b.len();
    if cost.nrows() != n || cost.ncols() != m {
        return Err(Error::CostShapeMismatch(n, m, cost.nrows(), cost.ncols()));
    }
    if cfg.epsilon <= 0.0 || !cfg.epsilon.is_finite() {
        return Err(Error::InvalidRegularization(cfg.epsilon));
    }
    if a.iter().any(|&v| v < 0.0) || b.iter().any(|&v| v < 0.0) {
        return Err(Error::Domain("weights must be nonnegative"));
    }

    // Boundary mode reweights each point's mass by its throwing cost.
    let (a_w, b_w) = if cfg.divergence == MarginalDivergence::Boundary {
        let ca = cdiag_a
            .ok_or(Error::Domain("boundary mode requires boundary-distance vectors"))?;
        let cb = cdiag_b
            .ok_or(Error::Domain("boundary mode requires boundary-distance vectors"))?;
        if ca.len() != n {
            return Err(Error::LengthMismatch(ca.len(), n));
        }
        if cb.len() != m {
            return Err(Error::LengthMismatch(cb.len(), m));
        }
        (ca * a, cb * b)
    } else {
        (a.clone(), b.clone())
    };

    let (mut f, mut g) = match cfg.init {
        PotentialInit::Unif => (Array1::ones(n), Array1::ones(m)),
        PotentialInit::Rand => {
            let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
            let f = Array1::from_shape_fn(n, |_| rng.gen::<f64>());
            let g = Array1::from_shape_fn(m, |_| rng.gen::<f64>());
            (f, g)
        }
    };

    let mut e = f64::NEG_INFINITY;
    let mut termination = Termination::ExhaustedSteps;

    for step in 0..cfg.max_steps {
        f = sinkhorn_map(&g, &b_w, &cost.t(), cdiag_a, &a_w, cfg);
        g = sinkhorn_map(&f, &a_w, &cost.view(), cdiag_b, &b_w, cfg);

        let new_e = estim_dual(&f, &g, &a_w, &b_w, cost, cdiag_a, cdiag_b, cfg);
        if cfg.verbose >= 2 {
            debug!("step {step}: dual objective {new_e:.9e}");
        }

        if ((new_e - e) / new_e).abs() < cfg.tol {
            e = new_e;
            termination = Termination::Converged { steps: step };
            if cfg.verbose >= 1 {
                info!("converged at step {step}");
            }
            break;
        }
        e = new_e;
    }

    if termination == Termination::ExhaustedSteps {
        if cfg.tol > 0.0 {
            warn!(
                "{} steps were not sufficient to reach relative criterion {}",
                cfg.max_steps, cfg.tol
            );
        } else if cfg.verbose >= 1 {
            info!(
                "convergence criterion is 0, ran the full {} step budget",
                cfg.max_steps
            );
        }
    }

    let plan = transport_plan(&f, &g, &a_w, &b_w, cfg.epsilon, cost, cfg.homogeneity);

    Ok(SinkhornSolution {
        plan,
        f,
        g,
        objective: e,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn line_points(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |(i, _)| i as f64)
    }

    #[test]
    fn config_default_is_sane() {
        let cfg = SinkhornConfig::default();
        assert_eq!(cfg.divergence, MarginalDivergence::Balanced);
        assert_eq!(cfg.homogeneity, Homogeneity::Std);
        assert!(cfg.epsilon > 0.0);
        assert!(cfg.stabilized);
        assert!(cfg.max_steps > 0);
        assert!(cfg.with_entropy);
    }

    #[test]
    fn balanced_marginals_match_weights() {
        let x = line_points(3);
        let a = array![0.2, 0.3, 0.5];
        let b = array![0.5, 0.2, 0.3];
        let cfg = SinkhornConfig {
            epsilon: 0.2,
            max_steps: 10_000,
            tol: 1e-10,
            ..Default::default()
        };

        let sol = sinkhorn(&x, &x, &a, &b, &cfg).unwrap();
        assert!(sol.termination.is_converged());

        for i in 0..3 {
            let row: f64 = sol.plan.row(i).sum();
            assert!((row - a[i]).abs() < 1e-3, "row {i}: {row} vs {}", a[i]);
        }
        for j in 0..3 {
            let col: f64 = sol.plan.column(j).sum();
            assert!((col - b[j]).abs() < 1e-3, "col {j}: {col} vs {}", b[j]);
        }
    }

    #[test]
    fn stabilized_and_plain_updates_agree() {
        let f = array![0.3, -0.7, 1.1];
        let a = array![0.5, 1.0, 0.25];
        let b = array![1.0, 0.5];
        let cost = array![[0.0, 1.0], [1.0, 0.5], [2.0, 0.3]];

        let mut cfg = SinkhornConfig {
            epsilon: 0.5,
            ..Default::default()
        };
        let stab = sinkhorn_map(&f, &a, &cost.view(), None, &b, &cfg);
        cfg.stabilized = false;
        let plain = sinkhorn_map(&f, &a, &cost.view(), None, &b, &cfg);

        for j in 0..2 {
            assert!((stab[j] - plain[j]).abs() < 1e-12, "{} vs {}", stab[j], plain[j]);
        }
    }

    #[test]
    fn stabilized_and_plain_solves_agree() {
        let x = line_points(4);
        let a = array![0.25, 0.25, 0.25, 0.25];
        let b = array![0.1, 0.4, 0.4, 0.1];
        let cfg = SinkhornConfig {
            epsilon: 0.3,
            max_steps: 2_000,
            tol: 1e-10,
            ..Default::default()
        };
        let stab = sinkhorn(&x, &x, &a, &b, &cfg).unwrap();
        let plain = sinkhorn(
            &x,
            &x,
            &a,
            &b,
            &SinkhornConfig {
                stabilized: false,
                ..cfg
            },
        )
        .unwrap();

        for i in 0..4 {
            assert!((stab.f[i] - plain.f[i]).abs() < 1e-8);
            assert!((stab.g[i] - plain.g[i]).abs() < 1e-8);
        }
        assert!((stab.objective - plain.objective).abs() < 1e-8);
    }

    #[test]
    fn tol_zero_runs_full_budget() {
        let x = line_points(2);
        let a = array![0.5, 0.5];
        let cfg = SinkhornConfig {
            max_steps: 50,
            tol: 0.0,
            verbose: 0,
            ..Default::default()
        };
        let sol = sinkhorn(&x, &x, &a, &a, &cfg).unwrap();
        assert_eq!(sol.termination, Termination::ExhaustedSteps);
        assert!(sol.objective.is_finite());
    }

    #[test]
    fn random_init_is_deterministic() {
        let x = line_points(3);
        let a = array![0.2, 0.3, 0.5];
        let cfg = SinkhornConfig {
            init: PotentialInit::Rand,
            max_steps: 5,
            tol: 0.0,
            verbose: 0,
            ..Default::default()
        };
        let s1 = sinkhorn(&x, &x, &a, &a, &cfg).unwrap();
        let s2 = sinkhorn(&x, &x, &a, &a, &cfg).unwrap();
        assert_eq!(s1.f, s2.f);
        assert_eq!(s1.g, s2.g);
    }

    #[test]
    fn rejects_bad_inputs() {
        let x = line_points(2);
        let a = array![0.5, 0.5];
        let short = array![1.0];
        let cfg = SinkhornConfig::default();

        assert!(matches!(
            sinkhorn(&x, &x, &short, &a, &cfg),
            Err(Error::LengthMismatch(2, 1))
        ));

        let neg = array![0.5, -0.5];
        assert!(matches!(
            sinkhorn(&x, &x, &neg, &a, &cfg),
            Err(Error::Domain(_))
        ));

        let bad_eps = SinkhornConfig {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            sinkhorn(&x, &x, &a, &a, &bad_eps),
            Err(Error::InvalidRegularization(_))
        ));

        let cost = Array2::zeros((3, 2));
        assert!(matches!(
            sinkhorn_with_cost(&a, &a, &cost, None, None, &cfg),
            Err(Error::CostShapeMismatch(2, 2, 3, 2))
        ));
    }

    #[test]
    fn boundary_mode_requires_cdiag_vectors() {
        let a = array![1.0];
        let cost = Array2::zeros((1, 1));
        let cfg = SinkhornConfig {
            divergence: MarginalDivergence::Boundary,
            ..Default::default()
        };
        assert!(matches!(
            sinkhorn_with_cost(&a, &a, &cost, None, None, &cfg),
            Err(Error::Domain(_))
        ));
    }

    proptest! {
        #[test]
        fn weighted_logsumexp_translation_invariant(
            xs in prop::collection::vec(-50.0f64..50.0, 1..32),
            shift in -10.0f64..10.0,
        ) {
            let w = vec![0.5f64; xs.len()];
            let l1 = weighted_logsumexp_by(xs.len(), |i| xs[i], |i| w[i]);
            let l2 = weighted_logsumexp_by(xs.len(), |i| xs[i] + shift, |i| w[i]);
            prop_assert!((l2 - (l1 + shift)).abs() < 1e-9);
        }

        #[test]
        fn weighted_logsumexp_matches_naive_on_safe_range(
            pairs in prop::collection::vec((-20.0f64..20.0, 0.01f64..4.0), 1..32),
        ) {
            let naive = pairs
                .iter()
                .map(|&(x, w)| x.exp() * w)
                .sum::<f64>()
                .ln();
            let stable = weighted_logsumexp_by(
                pairs.len(),
                |i| pairs[i].0,
                |i| pairs[i].1,
            );
            prop_assert!((stable - naive).abs() < 1e-9);
        }
    }
}
