//! Ground-cost construction for point clouds.

use ndarray::{Array1, Array2};

/// Create the Euclidean cost matrix from point positions.
///
/// `C[i,j] = ||x_i - y_j||` for `x` of shape `(m, d)` and `y` of shape
/// `(n, d)`.
///
/// # Panics
///
/// Panics if the point dimensions differ.
pub fn euclidean_cost_matrix(x: &Array2<f64>, y: &Array2<f64>) -> Array2<f64> {
    let m = x.nrows();
    let n = y.nrows();
    let d = x.ncols();

    assert_eq!(y.ncols(), d, "point dimensions must match");

    let mut cost = Array2::zeros((m, n));
    for i in 0..m {
        for j in 0..n {
            let mut dist_sq = 0.0;
            for k in 0..d {
                let diff = x[[i, k]] - y[[j, k]];
                dist_sq += diff * diff;
            }
            cost[[i, j]] = dist_sq.sqrt();
        }
    }
    cost
}

/// Orthogonal distance of 2-D points to the diagonal, squared and halved.
///
/// For each point `(x, y)` this is `(y - x)^2 / 2`, the cost of throwing
/// the point's mass onto the boundary `{x = y}`. Points exactly on the
/// diagonal get zero.
///
/// # Panics
///
/// Panics unless the points are 2-dimensional.
pub fn squared_dist_to_diag(x: &Array2<f64>) -> Array1<f64> {
    assert_eq!(x.ncols(), 2, "boundary distances are defined for 2-D points");
    let mut out = Array1::zeros(x.nrows());
    for i in 0..x.nrows() {
        let gap = x[[i, 1]] - x[[i, 0]];
        out[i] = gap * gap / 2.0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn euclidean_cost_matrix_basic() {
        let x = array![[0.0, 0.0], [1.0, 0.0]];
        let y = array![[0.0, 0.0], [0.0, 1.0]];

        let cost = euclidean_cost_matrix(&x, &y);

        assert!((cost[[0, 0]] - 0.0).abs() < 1e-12);
        assert!((cost[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((cost[[1, 0]] - 1.0).abs() < 1e-12);
        assert!((cost[[1, 1]] - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn euclidean_cost_matrix_rectangular() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![[0.5]];
        let cost = euclidean_cost_matrix(&x, &y);
        assert_eq!(cost.dim(), (3, 1));
        assert!((cost[[2, 0]] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn diagonal_points_have_zero_throwing_cost() {
        let x = array![[0.0, 0.0], [1.5, 1.5], [-2.0, -2.0]];
        let c = squared_dist_to_diag(&x);
        assert_eq!(c, array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn squared_dist_to_diag_formula() {
        let x = array![[0.0, 1.0], [1.0, 4.0], [2.0, 0.0]];
        let c = squared_dist_to_diag(&x);
        assert!((c[0] - 0.5).abs() < 1e-12);
        assert!((c[1] - 4.5).abs() < 1e-12);
        assert!((c[2] - 2.0).abs() < 1e-12);
    }
}
