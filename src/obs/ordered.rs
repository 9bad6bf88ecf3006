//! Coercion of an observation column into an ordered categorical time axis.
//!
//! The experimental-time column resolves directional ambiguity in the
//! transition estimate: between two equally similar neighbors, the one from
//! a later time point is the more plausible successor. The coercion is a
//! pure validate-and-transform pipeline; each step either advances or fails
//! terminally.

use crate::error::{FateError, Result};
use crate::obs::metadata::{CellMetadata, Variable, VariableType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Upper bound on derived categories. Protects against treating a
/// near-continuous numeric column as categorical.
pub const MAX_CATEGORIES: usize = 100;

/// An ordered categorical time axis, one entry per cell.
///
/// Categories are ascending numeric values; each cell holds the code
/// (category index) of its time point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedTime {
    cell_ids: Vec<String>,
    codes: Vec<usize>,
    categories: Vec<f64>,
}

impl OrderedTime {
    /// Cell identifiers, aligned with [`codes`](Self::codes).
    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Category code per cell, in cell order.
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Ascending category values.
    pub fn categories(&self) -> &[f64] {
        &self.categories
    }

    /// Category code of the cell at `index`.
    pub fn code(&self, index: usize) -> usize {
        self.codes[index]
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the axis is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of categories.
    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }
}

/// Coerce a metadata column into an ordered categorical time axis.
///
/// Steps, each failing terminally:
/// 1. the column must exist;
/// 2. non-numeric storage is coerced to float, failing with the column's
///    declared dtype if any value does not parse;
/// 3. distinct non-missing values become the categories, at most
///    [`MAX_CATEGORIES`] of them;
/// 4. string-categorical columns carry no order, so ascending order is
///    imposed with a warning;
/// 5. every cell is assigned its category code;
/// 6. missing values and fewer than 2 categories are errors.
///
/// The pipeline is a pure function of the column, so repeated application
/// yields identical output.
pub fn ensure_numeric_ordered(meta: &CellMetadata, key: &str) -> Result<OrderedTime> {
    let column = meta.column(key)?;
    let dtype = meta
        .column_type(key)
        .unwrap_or(VariableType::Categorical);

    // Coerce to float; missing stays NaN for now so the categories can be
    // derived from observed values only.
    let mut values = Vec::with_capacity(column.len());
    for var in column {
        let v = match var {
            Variable::Continuous(v) => *v,
            Variable::Missing => f64::NAN,
            Variable::Categorical(s) => {
                s.trim().parse::<f64>().map_err(|_| FateError::TypeCoercion {
                    column: key.to_string(),
                    dtype: dtype.name().to_string(),
                })?
            }
        };
        values.push(v);
    }

    let mut categories: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    categories.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    categories.dedup();

    if categories.len() > MAX_CATEGORIES {
        return Err(FateError::TooManyCategories {
            column: key.to_string(),
            count: categories.len(),
        });
    }

    match dtype {
        VariableType::Categorical => {
            warn!(column = key, "categories are not ordered; using ascending order");
        }
        VariableType::Continuous => {
            debug!(column = key, n_categories = categories.len(), "converting to categorical");
        }
    }

    let mut codes = Vec::with_capacity(values.len());
    for (idx, v) in values.iter().enumerate() {
        if v.is_nan() {
            return Err(FateError::MissingValues(format!(
                "Column '{}' contains NaN value(s), first at cell index {}",
                key, idx
            )));
        }
        // Categories are deduplicated, so the lookup always succeeds.
        let code = categories
            .binary_search_by(|c| c.partial_cmp(v).unwrap_or(Ordering::Equal))
            .map_err(|_| FateError::Numerical(format!("Value {} has no category", v)))?;
        codes.push(code);
    }

    if categories.len() < 2 {
        return Err(FateError::TooFewCategories {
            count: categories.len(),
        });
    }

    Ok(OrderedTime {
        cell_ids: meta.cell_ids().to_vec(),
        codes,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with_days(values: &[f64]) -> CellMetadata {
        let ids = (0..values.len()).map(|i| format!("C{}", i)).collect();
        CellMetadata::new(ids)
            .with_continuous_column("day", values)
            .unwrap()
    }

    #[test]
    fn test_numeric_column_yields_ordered_categories() {
        let meta = meta_with_days(&[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let time = ensure_numeric_ordered(&meta, "day").unwrap();

        assert_eq!(time.n_categories(), 3);
        assert_eq!(time.categories(), &[1.0, 2.0, 3.0]);
        assert_eq!(time.codes(), &[0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_string_column_is_coerced() {
        let meta = CellMetadata::new(vec!["C0".into(), "C1".into(), "C2".into()])
            .with_column(
                "day",
                vec![
                    Variable::Categorical("2".into()),
                    Variable::Categorical("0".into()),
                    Variable::Categorical("1".into()),
                ],
            )
            .unwrap();
        let time = ensure_numeric_ordered(&meta, "day").unwrap();
        assert_eq!(time.categories(), &[0.0, 1.0, 2.0]);
        assert_eq!(time.codes(), &[2, 0, 1]);
    }

    #[test]
    fn test_missing_key_fails() {
        let meta = meta_with_days(&[1.0, 2.0]);
        let err = ensure_numeric_ordered(&meta, "pseudotime").unwrap_err();
        assert!(matches!(err, FateError::MissingColumn(k) if k == "pseudotime"));
    }

    #[test]
    fn test_non_coercible_fails_with_dtype() {
        let meta = CellMetadata::new(vec!["C0".into(), "C1".into()])
            .with_column(
                "day",
                vec![
                    Variable::Categorical("early".into()),
                    Variable::Categorical("late".into()),
                ],
            )
            .unwrap();
        let err = ensure_numeric_ordered(&meta, "day").unwrap_err();
        match err {
            FateError::TypeCoercion { column, dtype } => {
                assert_eq!(column, "day");
                assert_eq!(dtype, "categorical");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_too_many_categories_names_count() {
        let values: Vec<f64> = (0..150).map(|i| i as f64).collect();
        let meta = meta_with_days(&values);
        let err = ensure_numeric_ordered(&meta, "day").unwrap_err();
        match err {
            FateError::TooManyCategories { count, .. } => assert_eq!(count, 150),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(MAX_CATEGORIES == 100);
    }

    #[test]
    fn test_nan_fails() {
        let meta = meta_with_days(&[1.0, f64::NAN, 2.0]);
        let err = ensure_numeric_ordered(&meta, "day").unwrap_err();
        assert!(matches!(err, FateError::MissingValues(_)));
    }

    #[test]
    fn test_single_category_fails() {
        let meta = meta_with_days(&[1.0, 1.0, 1.0]);
        let err = ensure_numeric_ordered(&meta, "day").unwrap_err();
        assert!(matches!(err, FateError::TooFewCategories { count: 1 }));
    }

    #[test]
    fn test_idempotent() {
        let meta = meta_with_days(&[0.5, 1.5, 0.5, 2.5]);
        let once = ensure_numeric_ordered(&meta, "day").unwrap();
        let twice = ensure_numeric_ordered(&meta, "day").unwrap();
        assert_eq!(once, twice);
    }
}
