//! Reconstruction of sparse (probability, correlation) matrix pairs from
//! flat value buffers.
//!
//! The transition-kernel layer computes per-row results into a flat buffer
//! of shape `(2, nnz)` — probabilities in row 0, correlations in row 1 —
//! over the sparsity pattern of a reference adjacency matrix, possibly with
//! rows processed in a batched order. `reconstruct_pair` turns the buffers
//! back into two CSR matrices in original row order, eliminates explicit
//! zeros, and enforces row-stochasticity of the probability matrix.

use crate::error::{FateError, Result};
use crate::graph::scatter::invert_permutation;
use sprs::{CsMat, TriMat};

/// Absolute tolerance for the row-stochasticity invariant.
pub const ROW_SUM_TOL: f64 = 1e-8;

/// Rebuild the probability and correlation matrices from flat value buffers.
///
/// `probs` and `cors` each hold one value per stored entry of `pattern`, in
/// the storage order of `pattern` with rows taken in `ixs` order when given
/// (the upstream batching order). The two returned matrices reuse the
/// pattern's column structure, are restored to original row order, have
/// explicit zeros removed, and the probability matrix is verified to be
/// row-stochastic.
///
/// The permutation is a transient artifact of the caller's batching step; it
/// is passed explicitly and never stored.
pub fn reconstruct_pair(
    probs: &[f64],
    cors: &[f64],
    pattern: &CsMat<f64>,
    ixs: Option<&[usize]>,
) -> Result<(CsMat<f64>, CsMat<f64>)> {
    let nnz = pattern.nnz();
    if probs.len() != nnz || cors.len() != nnz {
        return Err(FateError::ShapeMismatch {
            expected: format!("(2, {})", nnz),
            actual: format!("({}, {})", probs.len(), cors.len()),
        });
    }

    let (probs_mat, cors_mat) = match ixs {
        Some(ixs) => {
            if ixs.len() != pattern.rows() {
                return Err(FateError::PermutationLength {
                    expected: pattern.rows(),
                    actual: ixs.len(),
                });
            }
            // The buffers were filled with rows in `ixs` order, so first
            // build matrices over the row-permuted pattern, then undo the
            // permutation.
            let permuted = permute_rows(pattern, ixs)?;
            let probs_mat = with_values(&permuted, probs);
            let cors_mat = with_values(&permuted, cors);
            let inverse = invert_permutation(ixs);
            (
                permute_rows(&probs_mat, &inverse)?,
                permute_rows(&cors_mat, &inverse)?,
            )
        }
        None => (with_values(pattern, probs), with_values(pattern, cors)),
    };

    let probs_mat = eliminate_zeros(&probs_mat);
    let cors_mat = eliminate_zeros(&cors_mat);

    validate_row_stochastic(&probs_mat)?;

    Ok((probs_mat, cors_mat))
}

/// New matrix with `pattern`'s sparsity structure and the given values, in
/// storage order.
fn with_values(pattern: &CsMat<f64>, values: &[f64]) -> CsMat<f64> {
    let mut tri = TriMat::new(pattern.shape());
    let mut pos = 0;
    for (row, row_vec) in pattern.outer_iterator().enumerate() {
        for (col, _) in row_vec.iter() {
            tri.add_triplet(row, col, values[pos]);
            pos += 1;
        }
    }
    tri.to_csr()
}

/// Matrix whose row `k` is `mat`'s row `perm[k]`.
pub fn permute_rows(mat: &CsMat<f64>, perm: &[usize]) -> Result<CsMat<f64>> {
    if perm.len() != mat.rows() {
        return Err(FateError::PermutationLength {
            expected: mat.rows(),
            actual: perm.len(),
        });
    }
    let mut tri = TriMat::new(mat.shape());
    for (new_row, &old_row) in perm.iter().enumerate() {
        if old_row >= mat.rows() {
            return Err(FateError::InvalidParameter(format!(
                "Row index {} out of bounds for {} rows",
                old_row,
                mat.rows()
            )));
        }
        if let Some(row_vec) = mat.outer_view(old_row) {
            for (col, &val) in row_vec.iter() {
                tri.add_triplet(new_row, col, val);
            }
        }
    }
    Ok(tri.to_csr())
}

/// Copy of `mat` without explicitly stored zero entries.
pub fn eliminate_zeros(mat: &CsMat<f64>) -> CsMat<f64> {
    let mut tri = TriMat::new(mat.shape());
    for (row, row_vec) in mat.outer_iterator().enumerate() {
        for (col, &val) in row_vec.iter() {
            if val != 0.0 {
                tri.add_triplet(row, col, val);
            }
        }
    }
    tri.to_csr()
}

/// Verify that every row of `mat` sums to 1 within [`ROW_SUM_TOL`].
///
/// A non-stochastic transition matrix invalidates all downstream
/// Markov-chain analysis, so a violation is a hard error naming the
/// offending rows and their sums.
pub fn validate_row_stochastic(mat: &CsMat<f64>) -> Result<()> {
    let mut rows = Vec::new();
    let mut sums = Vec::new();
    for (row, row_vec) in mat.outer_iterator().enumerate() {
        let sum: f64 = row_vec.iter().map(|(_, &val)| val).sum();
        if (sum - 1.0).abs() > ROW_SUM_TOL {
            rows.push(row);
            sums.push(sum);
        }
    }
    if rows.is_empty() {
        Ok(())
    } else {
        Err(FateError::NotRowStochastic { rows, sums })
    }
}
