//! Hungarian algorithm for optimal detection-to-track assignment
//!
//! Thin wrapper over the Kuhn-Munkres implementation in `pathfinding`,
//! adding the pieces the association engine needs: rectangular matrices,
//! negative costs, and `-1` markers for rows that cannot be assigned.

use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};

/// Fixed-point scale applied before handing costs to the integer solver.
/// Association scores live in single digits, so six decimal places keep
/// ties exact without risking `i64` overflow on large matrices.
const COST_SCALE: f64 = 1e6;

/// Minimum-cost assignment solver.
pub struct HungarianSolver;

impl HungarianSolver {
    /// Solve the assignment problem for a dense `M x N` cost matrix.
    ///
    /// Returns a vector of length `M` where entry `i` is the column assigned
    /// to row `i`, or `-1` when the row is left unassigned (more rows than
    /// columns). Costs may be negative; the caller applies its own gating by
    /// shaping the matrix. An empty matrix yields an empty assignment.
    pub fn solve(cost: ArrayView2<f64>) -> Vec<i32> {
        let n_rows = cost.nrows();
        let n_cols = cost.ncols();

        if n_rows == 0 {
            return Vec::new();
        }
        if n_cols == 0 {
            return vec![-1; n_rows];
        }

        // Pad to square. The pad value is uniform, so dummy rows/columns
        // contribute a constant to the total and never distort the real
        // assignment.
        let size = n_rows.max(n_cols);
        let mut weights = Matrix::new(size, size, 0i64);
        for r in 0..n_rows {
            for c in 0..n_cols {
                let v = cost[[r, c]];
                let v = if v.is_finite() { v } else { 1e9 };
                weights[(r, c)] = (v * COST_SCALE).round() as i64;
            }
        }

        let (_total, assignment) = kuhn_munkres_min(&weights);

        (0..n_rows)
            .map(|r| {
                let c = assignment[r];
                if c < n_cols {
                    c as i32
                } else {
                    -1
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::prelude::*;

    /// Brute-force reference: try every row-to-column injection.
    fn reference_min_cost(cost: &Array2<f64>) -> f64 {
        let n_rows = cost.nrows();
        let n_cols = cost.ncols();
        if n_rows > n_cols {
            // The recursion below enumerates column choices for the first
            // min(rows, cols) rows; transpose so every row subset is covered.
            return reference_min_cost(&cost.t().to_owned());
        }
        let mut cols: Vec<usize> = (0..n_cols).collect();
        let mut best = f64::INFINITY;

        fn permute(cols: &mut Vec<usize>, k: usize, n_rows: usize, cost: &Array2<f64>, best: &mut f64) {
            if k == n_rows.min(cols.len()) {
                let total: f64 = (0..k).map(|r| cost[[r, cols[r]]]).sum();
                if total < *best {
                    *best = total;
                }
                return;
            }
            for i in k..cols.len() {
                cols.swap(k, i);
                permute(cols, k + 1, n_rows, cost, best);
                cols.swap(k, i);
            }
        }

        permute(&mut cols, 0, n_rows, cost, &mut best);
        best
    }

    fn solved_cost(cost: &Array2<f64>) -> f64 {
        HungarianSolver::solve(cost.view())
            .iter()
            .enumerate()
            .filter(|(_, &c)| c >= 0)
            .map(|(r, &c)| cost[[r, c as usize]])
            .sum()
    }

    #[test]
    fn test_empty_inputs() {
        assert!(HungarianSolver::solve(Array2::<f64>::zeros((0, 0)).view()).is_empty());
        assert_eq!(
            HungarianSolver::solve(Array2::<f64>::zeros((3, 0)).view()),
            vec![-1, -1, -1]
        );
        assert!(HungarianSolver::solve(Array2::<f64>::zeros((0, 4)).view()).is_empty());
    }

    #[test]
    fn test_simple_diagonal() {
        let cost = array![[1.0, 10.0, 10.0], [10.0, 1.0, 10.0], [10.0, 10.0, 1.0]];
        assert_eq!(HungarianSolver::solve(cost.view()), vec![0, 1, 2]);
    }

    #[test]
    fn test_anti_diagonal() {
        let cost = array![[10.0, 1.0], [1.0, 10.0]];
        assert_eq!(HungarianSolver::solve(cost.view()), vec![1, 0]);
    }

    #[test]
    fn test_negative_costs() {
        let cost = array![[-5.0, 0.0], [0.0, -5.0]];
        assert_eq!(HungarianSolver::solve(cost.view()), vec![0, 1]);
    }

    #[test]
    fn test_more_rows_than_columns_leaves_rows_unassigned() {
        let cost = array![[1.0], [2.0], [3.0]];
        let assignment = HungarianSolver::solve(cost.view());
        assert_eq!(assignment.len(), 3);
        assert_eq!(assignment.iter().filter(|&&c| c >= 0).count(), 1);
        assert_eq!(assignment[0], 0); // cheapest row wins the only column
    }

    #[test]
    fn test_more_columns_than_rows() {
        let cost = array![[9.0, 1.0, 9.0, 9.0]];
        assert_eq!(HungarianSolver::solve(cost.view()), vec![1]);
    }

    #[test]
    fn test_matches_reference_on_random_square_matrices() {
        let mut rng = StdRng::seed_from_u64(0x0c50);
        for n in 2..=6 {
            for _ in 0..20 {
                let cost = Array2::from_shape_fn((n, n), |_| rng.gen_range(0.0..10.0f64));
                let expected = reference_min_cost(&cost);
                let actual = solved_cost(&cost);
                assert!(
                    (actual - expected).abs() < 1e-4,
                    "n={n}: solver cost {actual} != reference {expected}"
                );
            }
        }
    }

    #[test]
    fn test_matches_reference_on_random_rectangular_matrices() {
        let mut rng = StdRng::seed_from_u64(0x0c51);
        for _ in 0..20 {
            let rows = rng.gen_range(1..=5);
            let cols = rng.gen_range(1..=5);
            let cost = Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-5.0..5.0f64));
            let expected = reference_min_cost(&cost);
            let actual = solved_cost(&cost);
            assert!(
                (actual - expected).abs() < 1e-4,
                "{rows}x{cols}: solver cost {actual} != reference {expected}"
            );
        }
    }
}
