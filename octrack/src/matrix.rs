//! Small dense matrix helpers for the Kalman update

use nalgebra::DMatrix;

/// Invert a small square matrix by Gauss-Jordan elimination with partial
/// pivoting.
///
/// Pivots with magnitude below `1e-10` are replaced by `1e-6` instead of
/// failing: the Kalman innovation covariance can become near-singular under
/// degenerate measurements, and a slightly regularized gain is preferable to
/// aborting the update. This is a contract of the tracker, not a fallback of
/// last resort.
pub fn invert_regularized(m: &DMatrix<f32>) -> DMatrix<f32> {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols(), "invert_regularized requires a square matrix");

    // Augmented [A | I].
    let mut aug = DMatrix::<f32>::zeros(n, 2 * n);
    for i in 0..n {
        for j in 0..n {
            aug[(i, j)] = m[(i, j)];
        }
        aug[(i, n + i)] = 1.0;
    }

    for col in 0..n {
        // Partial pivoting.
        let mut max_row = col;
        let mut max_val = aug[(col, col)].abs();
        for row in (col + 1)..n {
            let v = aug[(row, col)].abs();
            if v > max_val {
                max_val = v;
                max_row = row;
            }
        }
        if max_row != col {
            aug.swap_rows(col, max_row);
        }

        let mut pivot = aug[(col, col)];
        if pivot.abs() < 1e-10 {
            pivot = 1e-6;
            aug[(col, col)] = pivot;
        }

        for j in 0..(2 * n) {
            aug[(col, j)] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..(2 * n) {
                aug[(row, j)] -= factor * aug[(col, j)];
            }
        }
    }

    let mut inv = DMatrix::<f32>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            inv[(i, j)] = aug[(i, n + j)];
        }
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_invert_identity() {
        let i = DMatrix::<f32>::identity(4, 4);
        let inv = invert_regularized(&i);
        for r in 0..4 {
            for c in 0..4 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(inv[(r, c)], expected, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_invert_known_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let inv = invert_regularized(&m);
        assert_abs_diff_eq!(inv[(0, 0)], 0.6, epsilon = 1e-5);
        assert_abs_diff_eq!(inv[(0, 1)], -0.7, epsilon = 1e-5);
        assert_abs_diff_eq!(inv[(1, 0)], -0.2, epsilon = 1e-5);
        assert_abs_diff_eq!(inv[(1, 1)], 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_product_with_inverse_is_identity() {
        let m = DMatrix::from_row_slice(
            3,
            3,
            &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0],
        );
        let inv = invert_regularized(&m);
        let prod = &m * &inv;
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(prod[(r, c)], expected, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_singular_matrix_is_regularized() {
        // Rank-deficient; the plain inverse does not exist.
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let inv = invert_regularized(&m);
        // No NaN/inf anywhere; the regularization keeps values finite.
        assert!(inv.iter().all(|v| v.is_finite()));
    }
}
