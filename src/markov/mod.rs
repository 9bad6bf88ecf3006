//! Markov-chain decomposition: macro-states and absorption probabilities.

pub mod absorption;
pub mod decomp;
pub mod partition;

pub use absorption::{absorption_probabilities, AbsorptionResult};
pub use decomp::{decompose, Decomposition};
pub use partition::{partition, ChainPartition};
