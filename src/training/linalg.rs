//! Small dense solvers for normal equations

use ndarray::{Array1, Array2};

/// Relative pivot size below which a matrix is treated as singular
const SINGULAR_TOL: f64 = 1e-12;

fn mean_abs_diag(a: &Array2<f64>) -> f64 {
    let n = a.nrows().max(1);
    a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64
}

/// Cholesky factor `L` with `A = L L^T`, or `None` when `A` is not
/// numerically positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let scale = mean_abs_diag(a).max(f64::MIN_POSITIVE);
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= SINGULAR_TOL * scale {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// `A` with a small ridge added to every diagonal entry, proportional to
/// that entry plus a floor tied to the overall scale.
pub fn regularized(a: &Array2<f64>) -> Array2<f64> {
    let floor = 1e-10 * mean_abs_diag(a);
    let mut out = a.clone();
    for k in 0..a.nrows() {
        out[[k, k]] += 1e-8 * a[[k, k]].abs() + floor;
    }
    out
}

/// Solve a symmetric positive semi-definite system `A x = b`.
///
/// Tries a plain Cholesky solve, then a ridge-regularized one, then
/// Gauss-Jordan on the regularized matrix.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    if n == 0 {
        return Some(Array1::zeros(0));
    }

    if let Some(l) = cholesky(a) {
        return Some(cholesky_substitute(&l, b));
    }

    let a_reg = regularized(a);
    if let Some(l) = cholesky(&a_reg) {
        return Some(cholesky_substitute(&l, b));
    }

    matrix_inverse(&a_reg).map(|inv| inv.dot(b))
}

/// Gauss-Jordan inverse with partial pivoting
pub fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }
    let scale = m.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(f64::MIN_POSITIVE);

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        if aug[[col, col]].abs() < SINGULAR_TOL * scale {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

/// Inverse of a symmetric matrix, regularizing once when it is singular
pub fn inverse_spd(a: &Array2<f64>) -> Option<Array2<f64>> {
    matrix_inverse(a).or_else(|| matrix_inverse(&regularized(a)))
}

/// Least squares via normal equations `(X^T X) w = X^T y`
pub fn solve_least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Array1<f64>> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    solve_spd(&xtx, &xty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_spd_exact() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = solve_spd(&a, &b).unwrap();
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-10);
        assert!((back[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_singular_falls_back() {
        // Second row is twice the first
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        let x = solve_spd(&a, &b).unwrap();
        let back = a.dot(&x);
        assert!((back[0] - 1.0).abs() < 1e-4);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_matrix_inverse() {
        let m = array![[2.0, 0.0], [0.0, 4.0]];
        let inv = matrix_inverse(&m).unwrap();
        assert!((inv[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((inv[[1, 1]] - 0.25).abs() < 1e-12);
        assert!(matrix_inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_least_squares_recovers_line() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let w = solve_least_squares(&x, &y).unwrap();
        assert!((w[0] - 1.0).abs() < 1e-8);
        assert!((w[1] - 2.0).abs() < 1e-8);
    }
}
