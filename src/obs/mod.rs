//! Per-cell observation metadata.

pub mod metadata;
pub mod ordered;

pub use metadata::{CellMetadata, Variable, VariableType};
pub use ordered::{ensure_numeric_ordered, OrderedTime, MAX_CATEGORIES};
