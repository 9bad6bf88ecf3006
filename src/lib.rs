//! Markov-chain cell-fate mapping for single-cell data.
//!
//! This library models cellular differentiation as a Markov chain over a
//! graph of cells: a biologically informed, row-stochastic transition
//! matrix is constructed from similarity and RNA-velocity signals, and the
//! chain is decomposed into recurrent macro-states (stable cell identities)
//! with per-cell absorption probabilities.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **kernel**: numeric micro-kernels (axis reductions, per-row normal
//!   sampling, degenerate-distribution fallbacks)
//! - **graph**: sparse plumbing (batched scatter offsets, permutations,
//!   reconstruction of probability/correlation matrix pairs)
//! - **obs**: per-cell observation metadata and the ordered categorical
//!   time axis
//! - **transition**: transition-matrix construction (connectivity kernel,
//!   velocity kernel, convex combination)
//! - **markov**: chain decomposition (recurrent/transient partition,
//!   spectrum, absorption probabilities)
//!
//! # Example
//!
//! ```no_run
//! use cellfate::prelude::*;
//! use nalgebra::DMatrix;
//! use sprs::TriMat;
//!
//! // Expression and velocity for 3 cells x 2 genes.
//! let expression = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
//! let velocity = DMatrix::from_row_slice(3, 2, &[1.0, 0.1, 1.0, 0.1, 1.0, 0.1]);
//!
//! // Neighbor graph along the line.
//! let mut tri = TriMat::new((3, 3));
//! tri.add_triplet(0, 1, 1.0);
//! tri.add_triplet(1, 0, 1.0);
//! tri.add_triplet(1, 2, 1.0);
//! tri.add_triplet(2, 1, 1.0);
//! let graph = tri.to_csr();
//!
//! // Velocity kernel, regularized by the connectivity kernel.
//! let (vk, _correlations) = VelocityKernel::new(&expression, &velocity, &graph)
//!     .with_softmax_scale(4.0)
//!     .compute()
//!     .unwrap();
//! let ck = connectivity_kernel(&graph).unwrap();
//! let chain = combine(&vk, &ck, 0.2).unwrap();
//!
//! // Macro-states and absorption probabilities.
//! let part = partition(&chain);
//! let fates = absorption_probabilities(&chain, &part, true).unwrap();
//! println!("{} macro-states", part.n_recurrent_classes());
//! println!("cell 0 fates: {:?}", fates.cell_probabilities(0));
//! ```

pub mod error;
pub mod graph;
pub mod kernel;
pub mod markov;
pub mod obs;
pub mod transition;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::error::{FateError, Result};
    pub use crate::graph::{
        apply_permutation, argsort, calculate_starts, invert_permutation, reconstruct_pair,
    };
    pub use crate::kernel::{reduce, sample_normal, uniform_fallback, Axis, Reduction};
    pub use crate::markov::{
        absorption_probabilities, decompose, partition, AbsorptionResult, ChainPartition,
        Decomposition,
    };
    pub use crate::obs::{
        ensure_numeric_ordered, CellMetadata, OrderedTime, Variable, VariableType,
    };
    pub use crate::transition::{
        combine, connectivity_kernel, TransitionMatrix, VelocityKernel,
    };
}
