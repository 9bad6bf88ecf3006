//! Numeric micro-kernels for per-cell matrices.

pub mod reduce;
pub mod sample;

pub use reduce::{reduce, Axis, Reduction};
pub use sample::{cell_rng, sample_normal, uniform_fallback};
