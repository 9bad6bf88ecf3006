//! Spectral decomposition of the transition matrix.
//!
//! The slow-mixing structure of the chain lives in its leading spectrum:
//! eigenvalue moduli close to 1 correspond to metastable directions, and a
//! large gap after the k-th modulus indicates k macro-states. The real
//! Schur form is used instead of a raw eigendecomposition since the
//! transition matrix is non-symmetric.

use crate::error::{FateError, Result};
use crate::transition::TransitionMatrix;
use nalgebra::linalg::Schur;
use nalgebra::{Complex, DMatrix};
use std::cmp::Ordering;
use tracing::debug;

/// Leading spectrum of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Top eigenvalues, sorted by modulus descending.
    pub eigenvalues: Vec<Complex<f64>>,
    /// Gap between the last kept modulus and the first discarded one.
    pub eigengap: f64,
}

impl Decomposition {
    /// Moduli of the kept eigenvalues, descending.
    pub fn moduli(&self) -> Vec<f64> {
        self.eigenvalues.iter().map(|e| e.norm()).collect()
    }

    /// Number of kept components.
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }
}

/// Compute the top `n_components` eigenvalues of the chain via its real
/// Schur form.
///
/// Requires `2 <= n_components <= n_cells`. The decomposition densifies the
/// matrix, so it is intended for the chain sizes where a full Schur form is
/// tractable.
pub fn decompose(transition: &TransitionMatrix, n_components: usize) -> Result<Decomposition> {
    let n = transition.n_cells();
    if n_components < 2 {
        return Err(FateError::InvalidParameter(format!(
            "Expected at least 2 components, got {}",
            n_components
        )));
    }
    if n_components > n {
        return Err(FateError::InvalidParameter(format!(
            "Requested {} components from a chain with {} cells",
            n_components, n
        )));
    }

    let dense = to_dense(transition);
    let schur = Schur::try_new(dense, f64::EPSILON, 0).ok_or_else(|| {
        FateError::Numerical("Schur decomposition failed to converge".to_string())
    })?;

    let mut eigenvalues: Vec<Complex<f64>> = schur.complex_eigenvalues().iter().copied().collect();
    eigenvalues.sort_by(|a, b| {
        b.norm()
            .partial_cmp(&a.norm())
            .unwrap_or(Ordering::Equal)
    });

    let eigengap = if n_components < eigenvalues.len() {
        eigenvalues[n_components - 1].norm() - eigenvalues[n_components].norm()
    } else {
        0.0
    };
    eigenvalues.truncate(n_components);

    debug!(n_components, eigengap, "spectral decomposition computed");
    Ok(Decomposition {
        eigenvalues,
        eigengap,
    })
}

fn to_dense(transition: &TransitionMatrix) -> DMatrix<f64> {
    let n = transition.n_cells();
    let mut dense = DMatrix::zeros(n, n);
    for (row, row_vec) in transition.matrix().outer_iterator().enumerate() {
        for (col, &val) in row_vec.iter() {
            dense[(row, col)] = val;
        }
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    fn symmetric_chain() -> TransitionMatrix {
        // Doubly stochastic and symmetric: real spectrum, leading value 1.
        let mut tri = TriMat::new((3, 3));
        let p = [
            [0.6, 0.2, 0.2],
            [0.2, 0.6, 0.2],
            [0.2, 0.2, 0.6],
        ];
        for (r, row) in p.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                tri.add_triplet(r, c, v);
            }
        }
        TransitionMatrix::new(tri.to_csr()).unwrap()
    }

    #[test]
    fn test_leading_eigenvalue_is_one() {
        let tm = symmetric_chain();
        let decomp = decompose(&tm, 3).unwrap();

        assert_eq!(decomp.n_components(), 3);
        assert_relative_eq!(decomp.eigenvalues[0].re, 1.0, epsilon = 1e-8);
        assert_relative_eq!(decomp.eigenvalues[0].im, 0.0, epsilon = 1e-8);
        // Symmetric matrix: all eigenvalues real.
        for e in &decomp.eigenvalues {
            assert!(e.im.abs() < 1e-8);
        }
    }

    #[test]
    fn test_moduli_sorted_descending() {
        let tm = symmetric_chain();
        let decomp = decompose(&tm, 3).unwrap();
        let moduli = decomp.moduli();
        for pair in moduli.windows(2) {
            assert!(pair[0] >= pair[1] - 1e-12);
        }
    }

    #[test]
    fn test_eigengap_between_blocks() {
        // Two disconnected 2-cycles: eigenvalue 1 with multiplicity 2.
        let mut tri = TriMat::new((4, 4));
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(2, 3, 1.0);
        tri.add_triplet(3, 2, 1.0);
        let tm = TransitionMatrix::new(tri.to_csr()).unwrap();

        let decomp = decompose(&tm, 2).unwrap();
        assert_relative_eq!(decomp.eigenvalues[0].norm(), 1.0, epsilon = 1e-8);
        assert_relative_eq!(decomp.eigenvalues[1].norm(), 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_too_few_components_rejected() {
        let tm = symmetric_chain();
        let err = decompose(&tm, 1).unwrap_err();
        assert!(matches!(err, FateError::InvalidParameter(_)));
    }

    #[test]
    fn test_too_many_components_rejected() {
        let tm = symmetric_chain();
        let err = decompose(&tm, 4).unwrap_err();
        assert!(matches!(err, FateError::InvalidParameter(_)));
    }
}
