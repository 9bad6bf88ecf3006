//! Axis reductions over dense per-cell matrices.
//!
//! Applies a single-input reduction independently to every row or column of
//! a 2-D array. Only a closed set of reductions is ever needed, so they are
//! dispatched statically through an enum rather than a reduction callable.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Axis along which a reduction collapses a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Collapse each column into one value; result length = number of columns.
    Cols,
    /// Collapse each row into one value; result length = number of rows.
    Rows,
}

/// The reduction to apply along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Arithmetic mean.
    Mean,
    /// Population standard deviation (ddof = 0).
    Std,
    /// Maximum value.
    Max,
    /// Sum of values.
    Sum,
    /// Euclidean norm.
    Norm,
}

impl Reduction {
    /// Apply the reduction to a single row or column.
    fn apply(self, values: impl Iterator<Item = f64>) -> f64 {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            n += 1;
            sum += v;
            sum_sq += v * v;
            if v > max {
                max = v;
            }
        }
        match self {
            Reduction::Mean => sum / n as f64,
            Reduction::Std => {
                let mean = sum / n as f64;
                (sum_sq / n as f64 - mean * mean).max(0.0).sqrt()
            }
            Reduction::Max => max,
            Reduction::Sum => sum,
            Reduction::Norm => sum_sq.sqrt(),
        }
    }
}

/// Apply a reduction along an axis of a dense matrix.
///
/// The rows (or columns) are independent, so they are reduced in parallel.
/// The 2-dimensionality and axis-validity preconditions of the contract are
/// encoded in the argument types and cannot be violated at runtime.
pub fn reduce(matrix: &DMatrix<f64>, axis: Axis, op: Reduction) -> DVector<f64> {
    let values: Vec<f64> = match axis {
        Axis::Cols => (0..matrix.ncols())
            .into_par_iter()
            .map(|j| op.apply(matrix.column(j).iter().copied()))
            .collect(),
        Axis::Rows => (0..matrix.nrows())
            .into_par_iter()
            .map(|i| op.apply(matrix.row(i).iter().copied()))
            .collect(),
    };
    DVector::from_vec(values)
}
