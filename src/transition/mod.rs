//! Transition-matrix construction from similarity and velocity signals.

pub mod combined;
pub mod connectivity;
pub mod velocity;

pub use combined::combine;
pub use connectivity::connectivity_kernel;
pub use velocity::VelocityKernel;

use crate::error::{FateError, Result};
use crate::graph::validate_row_stochastic;
use sprs::CsMat;

/// A row-stochastic cell-cell transition matrix.
///
/// Row `i` holds the probabilities of moving from cell `i` to each of its
/// neighbors in one step. The row-stochasticity invariant is checked on
/// construction and holds for the lifetime of the value; the matrix is
/// read-only from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    matrix: CsMat<f64>,
}

impl TransitionMatrix {
    /// Wrap a sparse matrix, verifying that it is square and row-stochastic.
    pub fn new(matrix: CsMat<f64>) -> Result<Self> {
        if matrix.rows() != matrix.cols() {
            return Err(FateError::DimensionMismatch {
                expected: matrix.rows(),
                actual: matrix.cols(),
            });
        }
        validate_row_stochastic(&matrix)?;
        Ok(Self { matrix })
    }

    /// The underlying sparse matrix.
    pub fn matrix(&self) -> &CsMat<f64> {
        &self.matrix
    }

    /// Consume and return the underlying sparse matrix.
    pub fn into_inner(self) -> CsMat<f64> {
        self.matrix
    }

    /// Number of cells (states).
    pub fn n_cells(&self) -> usize {
        self.matrix.rows()
    }

    /// Sum of each row. All sums are within tolerance of 1 by construction.
    pub fn row_sums(&self) -> Vec<f64> {
        self.matrix
            .outer_iterator()
            .map(|row| row.iter().map(|(_, &v)| v).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_new_rejects_non_square() {
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 1, 1.0);
        let err = TransitionMatrix::new(tri.to_csr()).unwrap_err();
        assert!(matches!(err, FateError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_new_rejects_non_stochastic() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 0.7);
        tri.add_triplet(1, 1, 1.0);
        let err = TransitionMatrix::new(tri.to_csr()).unwrap_err();
        assert!(matches!(err, FateError::NotRowStochastic { .. }));
    }

    #[test]
    fn test_row_sums() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 0.4);
        tri.add_triplet(0, 1, 0.6);
        tri.add_triplet(1, 1, 1.0);
        let tm = TransitionMatrix::new(tri.to_csr()).unwrap();
        let sums = tm.row_sums();
        assert!((sums[0] - 1.0).abs() < 1e-12);
        assert!((sums[1] - 1.0).abs() < 1e-12);
    }
}
