//! Absorption probabilities towards the recurrent macro-states.
//!
//! With the states ordered as transient `T` and recurrent `R`, the chain
//! decomposes into blocks `[[Q, R], [0, P_R]]`. The probability that a
//! transient cell is eventually absorbed into a given recurrent class
//! solves the linear system `(I - Q) B = R_class`, and the expected number
//! of steps until absorption solves `(I - Q) t = 1`. One LU factorization
//! of `(I - Q)` is reused across all right-hand sides.

use crate::error::{FateError, Result};
use crate::markov::partition::ChainPartition;
use crate::transition::TransitionMatrix;
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Tolerance for the absorbed-mass check; looser than the construction
/// tolerance to allow for accumulated solver error.
const ABSORPTION_TOL: f64 = 1e-6;

/// Absorption probabilities (and optionally times) for every cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsorptionResult {
    /// `(n_cells, n_classes)` matrix; row `i` is the distribution over
    /// recurrent classes that cell `i` eventually commits to.
    probabilities: DMatrix<f64>,
    /// Expected steps to absorption per cell; zero for recurrent cells.
    mean_times: Option<DVector<f64>>,
}

impl AbsorptionResult {
    /// The full `(n_cells, n_classes)` probability matrix.
    pub fn probabilities(&self) -> &DMatrix<f64> {
        &self.probabilities
    }

    /// Absorption distribution of a single cell.
    pub fn cell_probabilities(&self, cell: usize) -> Vec<f64> {
        self.probabilities.row(cell).iter().copied().collect()
    }

    /// Expected steps to absorption, if requested.
    pub fn mean_times(&self) -> Option<&DVector<f64>> {
        self.mean_times.as_ref()
    }

    /// Number of recurrent classes.
    pub fn n_classes(&self) -> usize {
        self.probabilities.ncols()
    }
}

/// Compute per-cell absorption probabilities into each recurrent class.
///
/// Recurrent cells get the indicator of their own class. When
/// `with_times` is set, the mean time to absorption is solved from the same
/// factorization.
pub fn absorption_probabilities(
    transition: &TransitionMatrix,
    partition: &ChainPartition,
    with_times: bool,
) -> Result<AbsorptionResult> {
    let n = transition.n_cells();
    let classes = partition.recurrent_classes();
    let n_classes = classes.len();
    if n_classes == 0 {
        return Err(FateError::InvalidParameter(
            "Partition has no recurrent classes".to_string(),
        ));
    }

    let transient = partition.transient_states();
    let n_transient = transient.len();

    let mut probabilities = DMatrix::zeros(n, n_classes);
    for cell in 0..n {
        if let Some(class) = partition.class_of(cell) {
            probabilities[(cell, class)] = 1.0;
        }
    }

    if n_transient == 0 {
        let mean_times = with_times.then(|| DVector::zeros(n));
        return Ok(AbsorptionResult {
            probabilities,
            mean_times,
        });
    }

    // Position of each cell within the transient block.
    let mut transient_pos = vec![None; n];
    for (pos, &cell) in transient.iter().enumerate() {
        transient_pos[cell] = Some(pos);
    }

    // Build (I - Q) and the per-class absorption mass R * 1_class.
    let mut i_minus_q = DMatrix::identity(n_transient, n_transient);
    let mut class_mass = DMatrix::zeros(n_transient, n_classes);
    for (pos, &cell) in transient.iter().enumerate() {
        if let Some(row_vec) = transition.matrix().outer_view(cell) {
            for (col, &val) in row_vec.iter() {
                match transient_pos[col] {
                    Some(target) => i_minus_q[(pos, target)] -= val,
                    None => {
                        if let Some(class) = partition.class_of(col) {
                            class_mass[(pos, class)] += val;
                        }
                    }
                }
            }
        }
    }

    let lu = i_minus_q.lu();
    let absorbed = lu.solve(&class_mass).ok_or_else(|| {
        FateError::Numerical("Fundamental matrix (I - Q) is singular".to_string())
    })?;

    for (pos, &cell) in transient.iter().enumerate() {
        for class in 0..n_classes {
            probabilities[(cell, class)] = absorbed[(pos, class)];
        }
    }

    // Every row must be a probability distribution; solver error beyond
    // tolerance invalidates the result.
    let mut bad_rows = Vec::new();
    let mut bad_sums = Vec::new();
    for cell in 0..n {
        let sum: f64 = probabilities.row(cell).iter().sum();
        if (sum - 1.0).abs() > ABSORPTION_TOL {
            bad_rows.push(cell);
            bad_sums.push(sum);
        }
    }
    if !bad_rows.is_empty() {
        return Err(FateError::NotRowStochastic {
            rows: bad_rows,
            sums: bad_sums,
        });
    }

    let mean_times = if with_times {
        let ones = DVector::from_element(n_transient, 1.0);
        let t = lu
            .solve(&ones)
            .ok_or_else(|| {
                FateError::Numerical("Fundamental matrix (I - Q) is singular".to_string())
            })?;
        let mut times = DVector::zeros(n);
        for (pos, &cell) in transient.iter().enumerate() {
            times[cell] = t[pos];
        }
        Some(times)
    } else {
        None
    };

    debug!(
        n_transient,
        n_classes, "absorption probabilities computed"
    );
    Ok(AbsorptionResult {
        probabilities,
        mean_times,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markov::partition::partition;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    fn chain(entries: &[(usize, usize, f64)], n: usize) -> TransitionMatrix {
        let mut tri = TriMat::new((n, n));
        for &(r, c, v) in entries {
            tri.add_triplet(r, c, v);
        }
        TransitionMatrix::new(tri.to_csr()).unwrap()
    }

    #[test]
    fn test_single_absorbing_state() {
        let tm = chain(&[(0, 0, 1.0), (1, 0, 0.5), (1, 1, 0.5)], 2);
        let part = partition(&tm);
        let result = absorption_probabilities(&tm, &part, true).unwrap();

        assert_eq!(result.n_classes(), 1);
        assert_relative_eq!(result.probabilities()[(0, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.probabilities()[(1, 0)], 1.0, epsilon = 1e-10);

        // Geometric waiting time with p = 0.5: mean 2 steps.
        let times = result.mean_times().unwrap();
        assert_relative_eq!(times[0], 0.0);
        assert_relative_eq!(times[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_gamblers_ruin() {
        // States 0 and 3 absorbing; 1 and 2 step left or right with 1/2.
        let tm = chain(
            &[
                (0, 0, 1.0),
                (1, 0, 0.5),
                (1, 2, 0.5),
                (2, 1, 0.5),
                (2, 3, 0.5),
                (3, 3, 1.0),
            ],
            4,
        );
        let part = partition(&tm);
        let result = absorption_probabilities(&tm, &part, true).unwrap();

        // Closed form: from state i, P(hit 3 before 0) = i / 3.
        let class_of_0 = part.class_of(0).unwrap();
        let class_of_3 = part.class_of(3).unwrap();
        assert_relative_eq!(
            result.probabilities()[(1, class_of_3)],
            1.0 / 3.0,
            epsilon = 1e-10
        );
        assert_relative_eq!(
            result.probabilities()[(1, class_of_0)],
            2.0 / 3.0,
            epsilon = 1e-10
        );
        assert_relative_eq!(
            result.probabilities()[(2, class_of_3)],
            2.0 / 3.0,
            epsilon = 1e-10
        );

        // Expected absorption time from the interior of a length-3 walk.
        let times = result.mean_times().unwrap();
        assert_relative_eq!(times[1], 2.0, epsilon = 1e-10);
        assert_relative_eq!(times[2], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rows_are_distributions() {
        let tm = chain(
            &[
                (0, 0, 1.0),
                (1, 1, 1.0),
                (2, 0, 0.2),
                (2, 1, 0.3),
                (2, 2, 0.5),
            ],
            3,
        );
        let part = partition(&tm);
        let result = absorption_probabilities(&tm, &part, false).unwrap();

        for cell in 0..3 {
            let sum: f64 = result.cell_probabilities(cell).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
        assert!(result.mean_times().is_none());
    }

    #[test]
    fn test_no_transient_states() {
        let tm = chain(&[(0, 1, 1.0), (1, 0, 1.0)], 2);
        let part = partition(&tm);
        let result = absorption_probabilities(&tm, &part, true).unwrap();

        assert_eq!(result.n_classes(), 1);
        assert_relative_eq!(result.probabilities()[(0, 0)], 1.0);
        assert_relative_eq!(result.mean_times().unwrap()[0], 0.0);
    }

    #[test]
    fn test_recurrent_class_indicator() {
        // Recurrent 2-cycle {0, 1} plus absorbing state 2.
        let tm = chain(
            &[
                (0, 1, 1.0),
                (1, 0, 1.0),
                (2, 2, 1.0),
                (3, 0, 0.25),
                (3, 2, 0.25),
                (3, 3, 0.5),
            ],
            4,
        );
        let part = partition(&tm);
        let result = absorption_probabilities(&tm, &part, false).unwrap();

        let cycle_class = part.class_of(0).unwrap();
        assert_relative_eq!(result.probabilities()[(0, cycle_class)], 1.0);
        assert_relative_eq!(result.probabilities()[(1, cycle_class)], 1.0);
        // State 3 splits evenly between the two classes.
        assert_relative_eq!(result.probabilities()[(3, cycle_class)], 0.5, epsilon = 1e-10);
    }
}
