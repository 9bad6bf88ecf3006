//! Error types for the cellfate library.

use thiserror::Error;

/// Main error type for the library.
///
/// Variants are split by kind: precondition violations (caller misuse,
/// mismatched shapes or lengths), data-quality violations (valid shapes but
/// invalid contents, which abort the pipeline), and ambient I/O failures.
/// Callers can match on the variant instead of parsing messages.
#[derive(Error, Debug)]
pub enum FateError {
    // Precondition violations.
    #[error("Shape mismatch: expected `{expected}`, got `{actual}`")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Permutation length {actual} does not match row count {expected}")]
    PermutationLength { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Data-quality violations.
    #[error("Matrix is not row-stochastic. Rows {rows:?} have sums {sums:?}")]
    NotRowStochastic { rows: Vec<usize>, sums: Vec<f64> },

    #[error("Missing column '{0}' in cell metadata")]
    MissingColumn(String),

    #[error("Unable to convert column '{column}' of type `{dtype}` to float")]
    TypeCoercion { column: String, dtype: String },

    #[error("Converting column '{column}' to categorical would create {count} categories")]
    TooManyCategories { column: String, count: usize },

    #[error("Expected to find at least 2 categories, found {count}")]
    TooFewCategories { count: usize },

    #[error("Missing values: {0}")]
    MissingValues(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    // Ambient I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty data: {0}")]
    EmptyData(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, FateError>;
