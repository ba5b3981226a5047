use ndarray::array;
use sinkdiv::{sinkhorn, SinkhornConfig, Termination};

#[test]
fn exhausted_budget_still_returns_usable_solution() {
    // One step cannot satisfy a 1e-12 relative criterion on a nontrivial
    // problem, but the solver must hand back well-formed best-effort
    // results rather than fail.
    let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let y = array![[2.0, 2.0], [3.0, 1.0]];
    let a = array![0.3, 0.3, 0.4];
    let b = array![0.6, 0.4];

    let cfg = SinkhornConfig {
        epsilon: 0.1,
        max_steps: 1,
        tol: 1e-12,
        verbose: 0,
        ..Default::default()
    };

    let sol = sinkhorn(&x, &y, &a, &b, &cfg).unwrap();

    assert_eq!(sol.termination, Termination::ExhaustedSteps);
    assert_eq!(sol.plan.dim(), (3, 2));
    assert_eq!(sol.f.len(), 3);
    assert_eq!(sol.g.len(), 2);
    assert!(sol.plan.iter().all(|p| p.is_finite() && *p >= 0.0));
    assert!(sol.f.iter().all(|v| v.is_finite()));
    assert!(sol.g.iter().all(|v| v.is_finite()));
    assert!(sol.objective.is_finite());
}
