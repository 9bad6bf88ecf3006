//! Connectivity kernel: transition probabilities from graph similarity alone.

use crate::error::{FateError, Result};
use crate::kernel::uniform_fallback;
use crate::transition::TransitionMatrix;
use sprs::{CsMat, TriMat};
use tracing::debug;

/// Row-normalize a non-negative similarity matrix into transition
/// probabilities.
///
/// Rows whose stored entries all vanish fall back to a uniform distribution
/// over those entries; cells with no stored neighbors at all get a
/// self-loop, since a uniform row over zero entries is undefined.
pub fn connectivity_kernel(similarity: &CsMat<f64>) -> Result<TransitionMatrix> {
    if similarity.rows() != similarity.cols() {
        return Err(FateError::DimensionMismatch {
            expected: similarity.rows(),
            actual: similarity.cols(),
        });
    }

    let n = similarity.rows();
    let mut tri = TriMat::new((n, n));
    let mut n_fallback = 0usize;
    for (row, row_vec) in similarity.outer_iterator().enumerate() {
        let mut sum = 0.0;
        for (col, &val) in row_vec.iter() {
            if val < 0.0 {
                return Err(FateError::InvalidParameter(format!(
                    "Similarity at ({}, {}) is negative: {}",
                    row, col, val
                )));
            }
            sum += val;
        }
        if row_vec.nnz() == 0 {
            tri.add_triplet(row, row, 1.0);
            n_fallback += 1;
        } else if sum == 0.0 {
            let (probs, _) = uniform_fallback(row_vec.nnz());
            for ((col, _), &p) in row_vec.iter().zip(&probs) {
                tri.add_triplet(row, col, p);
            }
            n_fallback += 1;
        } else {
            for (col, &val) in row_vec.iter() {
                if val > 0.0 {
                    tri.add_triplet(row, col, val / sum);
                }
            }
        }
    }
    if n_fallback > 0 {
        debug!(n_fallback, "rows without similarity signal received fallback distributions");
    }

    TransitionMatrix::new(tri.to_csr())
}
