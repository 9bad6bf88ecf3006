//! Velocity kernel: directional transition probabilities from RNA velocity.
//!
//! For each cell, the velocity vector is correlated with the displacement
//! towards each graph neighbor; a scaled softmax over the correlations gives
//! the transition probabilities, and the raw correlations are kept as a
//! directional-confidence matrix sharing the same sparsity pattern.
//!
//! Rows are processed in degree-sorted batches: per-row results are written
//! into a flat `(2 x nnz)` buffer at precomputed offsets, so parallel
//! workers never overlap, and the pair of sparse matrices is reassembled
//! from the buffer afterwards.

use crate::error::{FateError, Result};
use crate::graph::{argsort, calculate_starts, reconstruct_pair};
use crate::kernel::{cell_rng, reduce, sample_normal, uniform_fallback, Axis, Reduction};
use crate::obs::OrderedTime;
use crate::transition::TransitionMatrix;
use nalgebra::DMatrix;
use rayon::prelude::*;
use sprs::CsMat;
use tracing::debug;

struct SamplingParams<'a> {
    variances: &'a DMatrix<f64>,
    n_samples: usize,
    seed: u64,
}

/// Builder for the velocity transition kernel.
///
/// `expression` and `velocity` are `(n_cells, n_features)` row-major dense
/// matrices; `graph` is the sparse neighbor adjacency whose pattern defines
/// which transitions are admissible. Every cell must have at least one
/// stored neighbor (isolated cells belong in the connectivity kernel, which
/// gives them self-loops).
pub struct VelocityKernel<'a> {
    expression: &'a DMatrix<f64>,
    velocity: &'a DMatrix<f64>,
    graph: &'a CsMat<f64>,
    softmax_scale: f64,
    time: Option<&'a OrderedTime>,
    sampling: Option<SamplingParams<'a>>,
}

impl<'a> VelocityKernel<'a> {
    /// Create a kernel with the default softmax scale.
    pub fn new(
        expression: &'a DMatrix<f64>,
        velocity: &'a DMatrix<f64>,
        graph: &'a CsMat<f64>,
    ) -> Self {
        Self {
            expression,
            velocity,
            graph,
            softmax_scale: 4.0,
            time: None,
            sampling: None,
        }
    }

    /// Set the softmax inverse-temperature. Higher values concentrate
    /// probability on the best-aligned neighbor.
    pub fn with_softmax_scale(mut self, scale: f64) -> Self {
        self.softmax_scale = scale;
        self
    }

    /// Mask transitions to strictly earlier time categories.
    pub fn with_time(mut self, time: &'a OrderedTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Propagate velocity uncertainty: draw `n_samples` velocity vectors per
    /// cell from `Normal(velocity, variances)` and average the resulting
    /// probabilities. Each cell derives its own generator stream from
    /// `seed`, so results are reproducible regardless of scheduling.
    pub fn with_sampling(
        mut self,
        variances: &'a DMatrix<f64>,
        n_samples: usize,
        seed: u64,
    ) -> Self {
        self.sampling = Some(SamplingParams {
            variances,
            n_samples,
            seed,
        });
        self
    }

    /// Compute the transition matrix and the correlation matrix.
    pub fn compute(&self) -> Result<(TransitionMatrix, CsMat<f64>)> {
        self.validate()?;

        let n = self.graph.rows();
        let degrees: Vec<usize> = self
            .graph
            .outer_iterator()
            .map(|row| row.nnz())
            .collect();

        // Batch rows by degree so parallel chunks are load-balanced, and
        // precompute each row's window in the flat output buffers.
        let order = argsort(&degrees);
        let mut indptr = vec![0usize; n + 1];
        for (i, &deg) in degrees.iter().enumerate() {
            indptr[i + 1] = indptr[i] + deg;
        }
        let starts = calculate_starts(&indptr, &order);

        let nnz = self.graph.nnz();
        let mut probs_buf = vec![0.0f64; nnz];
        let mut cors_buf = vec![0.0f64; nnz];
        {
            let mut p_slices: Vec<&mut [f64]> = Vec::with_capacity(order.len());
            let mut c_slices: Vec<&mut [f64]> = Vec::with_capacity(order.len());
            let mut rest_p = probs_buf.as_mut_slice();
            let mut rest_c = cors_buf.as_mut_slice();
            for k in 0..order.len() {
                let len = starts[k + 1] - starts[k];
                let (head_p, tail_p) = std::mem::take(&mut rest_p).split_at_mut(len);
                let (head_c, tail_c) = std::mem::take(&mut rest_c).split_at_mut(len);
                p_slices.push(head_p);
                c_slices.push(head_c);
                rest_p = tail_p;
                rest_c = tail_c;
            }

            p_slices
                .into_par_iter()
                .zip(c_slices.into_par_iter())
                .zip(order.par_iter())
                .try_for_each(|((p_out, c_out), &row)| self.fill_row(row, p_out, c_out))?;
        }

        debug!(n_cells = n, nnz, "velocity kernel computed, reconstructing sparse pair");
        let (probs, cors) = reconstruct_pair(&probs_buf, &cors_buf, self.graph, Some(&order))?;
        Ok((TransitionMatrix::new(probs)?, cors))
    }

    fn validate(&self) -> Result<()> {
        let shape = |m: &DMatrix<f64>| format!("({}, {})", m.nrows(), m.ncols());
        if self.expression.shape() != self.velocity.shape() {
            return Err(FateError::ShapeMismatch {
                expected: shape(self.expression),
                actual: shape(self.velocity),
            });
        }
        if self.graph.rows() != self.graph.cols() {
            return Err(FateError::DimensionMismatch {
                expected: self.graph.rows(),
                actual: self.graph.cols(),
            });
        }
        if self.graph.rows() != self.expression.nrows() {
            return Err(FateError::DimensionMismatch {
                expected: self.expression.nrows(),
                actual: self.graph.rows(),
            });
        }
        if !(self.softmax_scale.is_finite() && self.softmax_scale > 0.0) {
            return Err(FateError::InvalidParameter(format!(
                "softmax_scale must be positive and finite, got {}",
                self.softmax_scale
            )));
        }
        if let Some(time) = self.time {
            if time.len() != self.graph.rows() {
                return Err(FateError::DimensionMismatch {
                    expected: self.graph.rows(),
                    actual: time.len(),
                });
            }
        }
        if let Some(sp) = &self.sampling {
            if sp.variances.shape() != self.velocity.shape() {
                return Err(FateError::ShapeMismatch {
                    expected: shape(self.velocity),
                    actual: shape(sp.variances),
                });
            }
            if sp.n_samples == 0 {
                return Err(FateError::InvalidParameter(
                    "n_samples must be at least 1".to_string(),
                ));
            }
        }
        for (row, row_vec) in self.graph.outer_iterator().enumerate() {
            if row_vec.nnz() == 0 {
                return Err(FateError::InvalidParameter(format!(
                    "Cell {} has no neighbors in the graph",
                    row
                )));
            }
        }
        Ok(())
    }

    /// Fill one row's probability and correlation slice.
    fn fill_row(&self, row: usize, p_out: &mut [f64], c_out: &mut [f64]) -> Result<()> {
        let Some(view) = self.graph.outer_view(row) else {
            return Ok(());
        };
        let neighbors = view.indices();
        let k = neighbors.len();
        let d = self.expression.ncols();

        // Displacement towards each neighbor in feature space.
        let mut disp = DMatrix::zeros(k, d);
        for (idx, &j) in neighbors.iter().enumerate() {
            for g in 0..d {
                disp[(idx, g)] = self.expression[(j, g)] - self.expression[(row, g)];
            }
        }

        // A neighbor is admissible unless it belongs to a strictly earlier
        // time category than the current cell.
        let allowed: Option<Vec<bool>> = self.time.map(|t| {
            neighbors
                .iter()
                .map(|&j| t.code(j) >= t.code(row))
                .collect()
        });
        let allowed = allowed.as_deref();

        match &self.sampling {
            None => {
                let v: Vec<f64> = self.velocity.row(row).iter().copied().collect();
                let (probs, cors) = softmax_row(&v, &disp, allowed, self.softmax_scale);
                p_out.copy_from_slice(&probs);
                c_out.copy_from_slice(&cors);
            }
            Some(sp) => {
                let means: Vec<f64> = self.velocity.row(row).iter().copied().collect();
                let vars: Vec<f64> = sp.variances.row(row).iter().copied().collect();
                let mut rng = cell_rng(sp.seed, row);
                let draws = sample_normal(&means, &vars, sp.n_samples, &mut rng)?;

                let mut acc_probs = vec![0.0f64; k];
                let mut acc_cors = vec![0.0f64; k];
                for s in 0..sp.n_samples {
                    let v: Vec<f64> = draws.row(s).iter().copied().collect();
                    let (probs, cors) = softmax_row(&v, &disp, allowed, self.softmax_scale);
                    for i in 0..k {
                        acc_probs[i] += probs[i];
                        acc_cors[i] += cors[i];
                    }
                }
                let inv = 1.0 / sp.n_samples as f64;
                for i in 0..k {
                    p_out[i] = acc_probs[i] * inv;
                    c_out[i] = acc_cors[i] * inv;
                }
            }
        }
        Ok(())
    }
}

/// Correlate a velocity vector with each displacement row and map the
/// correlations through a scaled softmax.
///
/// A zero-norm velocity carries no direction, and a row whose admissible set
/// is empty has no valid successor under the time constraint; both fall back
/// to the uniform distribution over all stored neighbors.
fn softmax_row(
    velocity: &[f64],
    disp: &DMatrix<f64>,
    allowed: Option<&[bool]>,
    scale: f64,
) -> (Vec<f64>, Vec<f64>) {
    let k = disp.nrows();
    let d = velocity.len();

    let v_mean = velocity.iter().sum::<f64>() / d as f64;
    let vc: Vec<f64> = velocity.iter().map(|&v| v - v_mean).collect();
    let v_norm = vc.iter().map(|v| v * v).sum::<f64>().sqrt();
    if v_norm == 0.0 {
        let (probs, cors) = uniform_fallback(k);
        return (probs, cors);
    }

    // Pearson correlation of the centered velocity against each centered
    // displacement row.
    let means = reduce(disp, Axis::Rows, Reduction::Mean);
    let mut centered = disp.clone();
    for i in 0..k {
        for g in 0..d {
            centered[(i, g)] -= means[i];
        }
    }
    let norms = reduce(&centered, Axis::Rows, Reduction::Norm);

    let mut cors = vec![0.0f64; k];
    for i in 0..k {
        let dot: f64 = (0..d).map(|g| centered[(i, g)] * vc[g]).sum();
        let denom = norms[i] * v_norm;
        cors[i] = if denom > 0.0 { dot / denom } else { 0.0 };
    }

    let is_allowed = |i: usize| allowed.map_or(true, |a| a[i]);
    let max = (0..k)
        .filter(|&i| is_allowed(i))
        .map(|i| cors[i])
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        // Every neighbor was masked out by the time constraint.
        let (probs, _) = uniform_fallback(k);
        return (probs, cors);
    }

    let mut probs = vec![0.0f64; k];
    let mut sum = 0.0;
    for i in 0..k {
        if is_allowed(i) {
            let e = (scale * (cors[i] - max)).exp();
            probs[i] = e;
            sum += e;
        }
    }
    for p in &mut probs {
        *p /= sum;
    }
    (probs, cors)
}
