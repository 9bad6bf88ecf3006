//! Convex combination of transition kernels.

use crate::error::{FateError, Result};
use crate::graph::eliminate_zeros;
use crate::transition::TransitionMatrix;

/// Combine a velocity kernel with a connectivity kernel:
/// `(1 - weight) * velocity + weight * connectivity`.
///
/// A small connectivity weight regularizes the directional estimate with
/// the undirected graph structure. Both inputs are row-stochastic, so any
/// convex combination is too; the result is still validated after the
/// sparse addition.
pub fn combine(
    velocity: &TransitionMatrix,
    connectivity: &TransitionMatrix,
    weight: f64,
) -> Result<TransitionMatrix> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(FateError::InvalidParameter(format!(
            "Connectivity weight must be in [0, 1], got {}",
            weight
        )));
    }
    if velocity.n_cells() != connectivity.n_cells() {
        return Err(FateError::DimensionMismatch {
            expected: velocity.n_cells(),
            actual: connectivity.n_cells(),
        });
    }

    let scaled_velocity = velocity.matrix().map(|v| v * (1.0 - weight));
    let scaled_connectivity = connectivity.matrix().map(|v| v * weight);
    let sum = &scaled_velocity + &scaled_connectivity;
    TransitionMatrix::new(eliminate_zeros(&sum))
}
