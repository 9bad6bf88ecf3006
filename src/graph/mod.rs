//! Sparse-graph plumbing: batched scatter offsets and matrix reconstruction.

pub mod reconstruct;
pub mod scatter;

pub use reconstruct::{eliminate_zeros, permute_rows, reconstruct_pair, validate_row_stochastic};
pub use scatter::{apply_permutation, argsort, calculate_starts, invert_permutation};
