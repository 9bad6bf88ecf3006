//! Per-row normal sampling and degenerate-distribution fallbacks.

use crate::error::{FateError, Result};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Draw `n_samples` vectors from per-element normal distributions.
///
/// Element `[s, i]` of the returned `(n_samples, len)` matrix is drawn from
/// `Normal(means[i], sqrt(variances[i]))`. A zero variance yields the mean
/// exactly. The generator is owned by the caller, so results are
/// reproducible under a fixed seed.
pub fn sample_normal(
    means: &[f64],
    variances: &[f64],
    n_samples: usize,
    rng: &mut StdRng,
) -> Result<DMatrix<f64>> {
    if means.len() != variances.len() {
        return Err(FateError::ShapeMismatch {
            expected: format!("({},)", means.len()),
            actual: format!("({},)", variances.len()),
        });
    }
    if n_samples == 0 {
        return Err(FateError::InvalidParameter(
            "n_samples must be at least 1".to_string(),
        ));
    }

    let len = means.len();
    let mut out = DMatrix::zeros(n_samples, len);
    for (i, (&mean, &var)) in means.iter().zip(variances).enumerate() {
        if !(var.is_finite() && var >= 0.0) {
            return Err(FateError::Numerical(format!(
                "Variance at position {} is `{}`, expected a finite non-negative value",
                i, var
            )));
        }
        if var == 0.0 {
            for s in 0..n_samples {
                out[(s, i)] = mean;
            }
            continue;
        }
        let dist = Normal::new(mean, var.sqrt())
            .map_err(|e| FateError::Numerical(format!("Invalid normal distribution: {}", e)))?;
        for s in 0..n_samples {
            out[(s, i)] = dist.sample(rng);
        }
    }
    Ok(out)
}

/// Derive an independent per-cell generator from a base seed.
///
/// Parallel workers sampling different cells must not share a stream, so
/// each cell's stream is keyed by its index. The multiplier decorrelates
/// consecutive indices (splitmix64 increment).
pub fn cell_rng(seed: u64, cell: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (cell as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Uniform probability vector and zero variance vector for a cell with no
/// usable signal.
///
/// Both vectors are `f64`: single precision does not carry enough precision
/// for the downstream row-stochasticity checks.
pub fn uniform_fallback(size: usize) -> (Vec<f64>, Vec<f64>) {
    (vec![1.0 / size as f64; size], vec![0.0; size])
}
