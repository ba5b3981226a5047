// Transport between persistence diagrams with an absorbing boundary.
//
// A persistence diagram is a multiset of (birth, death) points above the
// diagonal. Diagrams rarely have the same number of features, so instead
// of forcing a bijection, each point may be discarded onto the diagonal
// at the cost of its squared, halved distance to it. Points close to the
// diagonal (noise) are cheap to drop; prominent features are not.

use ndarray::array;
use sinkdiv::{sinkhorn, sinkhorn_divergence, MarginalDivergence, SinkhornConfig};

fn main() {
    // Two diagrams: one prominent feature each, plus near-diagonal noise
    // in the first.
    let x = array![[0.0, 3.0], [1.0, 1.2], [2.0, 2.3]];
    let y = array![[0.2, 2.8]];
    let a = array![1.0, 1.0, 1.0];
    let b = array![1.0];

    let cfg = SinkhornConfig {
        divergence: MarginalDivergence::Boundary,
        epsilon: 0.05,
        max_steps: 10_000,
        tol: 1e-8,
        verbose: 0,
        ..Default::default()
    };

    let sol = sinkhorn(&x, &y, &a, &b, &cfg).unwrap();
    println!("converged: {}", sol.termination.is_converged());
    println!("transport plan (rows: diagram 1, col: diagram 2):");
    for i in 0..3 {
        println!("  feature {i}: {:.4}", sol.plan[[i, 0]]);
    }

    let div = sinkhorn_divergence(&x, &y, &a, &b, &cfg).unwrap();
    println!("boundary Sinkhorn divergence: {div:.6}");
}
