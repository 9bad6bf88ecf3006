//! Per-cell observation metadata table.

use crate::error::{FateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A per-cell observation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical value with a string label.
    Categorical(String),
    /// Continuous numeric value.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as a categorical label.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }
}

/// Declared storage type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

impl VariableType {
    /// Human-readable dtype name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Categorical => "categorical",
            VariableType::Continuous => "continuous",
        }
    }
}

/// Observation metadata: one row per cell, named typed columns.
///
/// Columns are stored column-major since downstream consumers always read
/// whole columns (e.g. the experimental-time axis).
#[derive(Debug, Clone)]
pub struct CellMetadata {
    /// Cell identifiers in order.
    cell_ids: Vec<String>,
    /// Column names in insertion order.
    column_names: Vec<String>,
    /// Column name -> per-cell values (same order as `cell_ids`).
    columns: HashMap<String, Vec<Variable>>,
    /// Declared type per column.
    column_types: HashMap<String, VariableType>,
}

impl CellMetadata {
    /// Create an empty table over the given cells.
    pub fn new(cell_ids: Vec<String>) -> Self {
        Self {
            cell_ids,
            column_names: Vec::new(),
            columns: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Add a column, inferring its type: continuous if every non-missing
    /// value is numeric, otherwise categorical.
    pub fn with_column(mut self, name: &str, values: Vec<Variable>) -> Result<Self> {
        if values.len() != self.cell_ids.len() {
            return Err(FateError::DimensionMismatch {
                expected: self.cell_ids.len(),
                actual: values.len(),
            });
        }
        let var_type = if values
            .iter()
            .all(|v| !matches!(v, Variable::Categorical(_)))
        {
            VariableType::Continuous
        } else {
            VariableType::Categorical
        };
        if !self.columns.contains_key(name) {
            self.column_names.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        self.column_types.insert(name.to_string(), var_type);
        Ok(self)
    }

    /// Add a column of continuous values.
    pub fn with_continuous_column(self, name: &str, values: &[f64]) -> Result<Self> {
        self.with_column(
            name,
            values.iter().map(|&v| Variable::Continuous(v)).collect(),
        )
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is the cell ID)
    /// - Subsequent rows: cell ID followed by values
    ///
    /// Columns are inferred as continuous if all values parse as numbers,
    /// otherwise categorical. Empty fields and `NA` are missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| FateError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(FateError::EmptyData(
                "Metadata must have at least one observation column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        let mut cell_ids = Vec::new();
        let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); column_names.len()];
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            cell_ids.push(fields[0].to_string());
            for (col_idx, raw) in raw_columns.iter_mut().enumerate() {
                raw.push(
                    fields
                        .get(col_idx + 1)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                );
            }
        }
        if cell_ids.is_empty() {
            return Err(FateError::EmptyData("No cells in metadata".to_string()));
        }

        let mut meta = Self::new(cell_ids);
        for (name, raw) in column_names.iter().zip(raw_columns) {
            let all_numeric = raw
                .iter()
                .all(|v| is_missing_field(v) || v.parse::<f64>().is_ok());
            let values = raw
                .into_iter()
                .map(|v| {
                    if is_missing_field(&v) {
                        Variable::Missing
                    } else if all_numeric {
                        // parse cannot fail here, every field was checked
                        v.parse::<f64>().map_or(Variable::Missing, Variable::Continuous)
                    } else {
                        Variable::Categorical(v)
                    }
                })
                .collect();
            meta = meta.with_column(name, values)?;
        }
        Ok(meta)
    }

    /// Cell identifiers in order.
    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// All values of a column, in cell order.
    pub fn column(&self, name: &str) -> Result<&[Variable]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| FateError::MissingColumn(name.to_string()))
    }

    /// Declared type of a column.
    pub fn column_type(&self, name: &str) -> Option<VariableType> {
        self.column_types.get(name).copied()
    }

    /// Value for a single cell, by cell ID.
    pub fn get(&self, cell_id: &str, column: &str) -> Option<&Variable> {
        let idx = self.cell_ids.iter().position(|id| id == cell_id)?;
        self.columns.get(column).and_then(|col| col.get(idx))
    }
}

fn is_missing_field(v: &str) -> bool {
    v.is_empty() || v == "NA" || v == "na" || v == "NaN"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cell_id\tcluster\tday").unwrap();
        writeln!(file, "C1\tductal\t0").unwrap();
        writeln!(file, "C2\tngn3_low\t1.5").unwrap();
        writeln!(file, "C3\tductal\t0").unwrap();
        writeln!(file, "C4\tbeta\t3").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = CellMetadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_cells(), 4);
        assert_eq!(meta.cell_ids(), &["C1", "C2", "C3", "C4"]);
        assert_eq!(meta.column_names(), &["cluster", "day"]);
    }

    #[test]
    fn test_type_inference() {
        let file = create_test_tsv();
        let meta = CellMetadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.column_type("cluster"), Some(VariableType::Categorical));
        assert_eq!(meta.column_type("day"), Some(VariableType::Continuous));
    }

    #[test]
    fn test_get_value() {
        let file = create_test_tsv();
        let meta = CellMetadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.get("C1", "cluster").unwrap().as_categorical(), Some("ductal"));
        assert_eq!(meta.get("C2", "day").unwrap().as_continuous(), Some(1.5));
    }

    #[test]
    fn test_missing_column() {
        let file = create_test_tsv();
        let meta = CellMetadata::from_tsv(file.path()).unwrap();

        let err = meta.column("batch").unwrap_err();
        assert!(matches!(err, FateError::MissingColumn(name) if name == "batch"));
    }

    #[test]
    fn test_missing_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cell_id\tday").unwrap();
        writeln!(file, "C1\t1").unwrap();
        writeln!(file, "C2\tNA").unwrap();
        writeln!(file, "C3\t").unwrap();
        file.flush().unwrap();

        let meta = CellMetadata::from_tsv(file.path()).unwrap();
        assert!(meta.get("C2", "day").unwrap().is_missing());
        assert!(meta.get("C3", "day").unwrap().is_missing());
    }

    #[test]
    fn test_with_column_length_check() {
        let meta = CellMetadata::new(vec!["C1".into(), "C2".into()]);
        let err = meta.with_continuous_column("day", &[1.0]).unwrap_err();
        assert!(matches!(err, FateError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_in_memory_builder() {
        let meta = CellMetadata::new(vec!["C1".into(), "C2".into()])
            .with_continuous_column("day", &[0.0, 1.0])
            .unwrap();
        assert!(meta.has_column("day"));
        assert_eq!(meta.column_type("day"), Some(VariableType::Continuous));
    }
}
