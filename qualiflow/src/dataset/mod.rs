//! Tabular dataset model.
//!
//! Stages exchange datasets as serialized artifacts, so the type is
//! column-major, owned, and serde-friendly. A missing cell is `None`;
//! there is no NaN sentinel anywhere in the data path.

pub mod stats;

use crate::errors::DatasetError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;

/// The cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    /// Numeric cells; `None` marks a missing value.
    Numeric(Vec<Option<f64>>),
    /// Categorical cells; `None` marks a missing value.
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    /// Returns the number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    /// Returns true if the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of missing cells.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        match self {
            Self::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Self::Categorical(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// The column name.
    pub name: String,
    /// The column cells.
    pub data: ColumnData,
}

impl Column {
    /// Creates a numeric column.
    #[must_use]
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Creates a categorical column.
    #[must_use]
    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    /// Returns true if the column holds numeric cells.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    /// Returns the present (non-missing) numeric values, or `None` for a
    /// categorical column.
    #[must_use]
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v.iter().filter_map(|c| *c).collect()),
            ColumnData::Categorical(_) => None,
        }
    }

    /// Returns the distinct present categories, or `None` for a numeric
    /// column.
    #[must_use]
    pub fn distinct_categories(&self) -> Option<Vec<String>> {
        match &self.data {
            ColumnData::Categorical(v) => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for cell in v.iter().flatten() {
                    if seen.insert(cell.clone()) {
                        out.push(cell.clone());
                    }
                }
                Some(out)
            }
            ColumnData::Numeric(_) => None,
        }
    }

    fn cell_repr(&self, row: usize, out: &mut String) {
        match &self.data {
            ColumnData::Numeric(v) => match v.get(row).copied().flatten() {
                Some(x) => {
                    let _ = write!(out, "{x:?}");
                }
                None => out.push('\u{2205}'),
            },
            ColumnData::Categorical(v) => match v.get(row).and_then(Option::as_deref) {
                Some(s) => out.push_str(s),
                None => out.push('\u{2205}'),
            },
        }
    }
}

/// An owned, column-major tabular dataset.
///
/// Construction goes through [`Dataset::builder`], which rejects ragged
/// columns; every accessor can therefore assume rectangular data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Starts building a dataset.
    #[must_use]
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    /// Returns an empty dataset.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the dataset has no rows or no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }

    /// Returns the columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if a column with the given name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the names of all numeric columns, in declaration order.
    #[must_use]
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Returns the missing-cell ratio of a column, in `[0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn missing_ratio(&self, name: &str) -> Result<f64, DatasetError> {
        let col = self.column(name).ok_or_else(|| DatasetError::UnknownColumn {
            column: name.to_string(),
        })?;
        if self.rows == 0 {
            return Ok(0.0);
        }
        Ok(col.data.missing_count() as f64 / self.rows as f64)
    }

    /// Returns the total number of missing cells across all columns.
    #[must_use]
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.data.missing_count()).sum()
    }

    /// Returns a canonical textual signature of one row, used for exact
    /// duplicate detection.
    #[must_use]
    pub fn row_signature(&self, row: usize) -> String {
        let mut sig = String::new();
        for col in &self.columns {
            col.cell_repr(row, &mut sig);
            sig.push('\u{1f}');
        }
        sig
    }

    /// Counts rows that are exact duplicates of an earlier row.
    #[must_use]
    pub fn duplicate_row_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.rows);
        let mut dup = 0;
        for row in 0..self.rows {
            if !seen.insert(self.row_signature(row)) {
                dup += 1;
            }
        }
        dup
    }

    /// Returns a copy with exact duplicate rows removed (first occurrence
    /// kept).
    #[must_use]
    pub fn drop_duplicates(&self) -> Self {
        let mut seen = HashSet::with_capacity(self.rows);
        let keep: Vec<usize> = (0..self.rows)
            .filter(|&row| seen.insert(self.row_signature(row)))
            .collect();
        self.select_rows(&keep)
    }

    /// Returns a copy containing only the given rows, in the given order.
    ///
    /// Out-of-range indices are ignored.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.rows).collect();
        let columns = self
            .columns
            .iter()
            .map(|col| Column {
                name: col.name.clone(),
                data: match &col.data {
                    ColumnData::Numeric(v) => {
                        ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect())
                    }
                    ColumnData::Categorical(v) => {
                        ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
                    }
                },
            })
            .collect();
        Self {
            columns,
            rows: indices.len(),
        }
    }

    /// Computes a short content hash of the dataset.
    ///
    /// The hash is a pure function of column names, column kinds, and cell
    /// values: it changes if and only if the dataset content changes. Used
    /// to detect silent data corruption between stages.
    #[must_use]
    pub fn data_hash(&self) -> String {
        let mut canonical = String::new();
        for col in &self.columns {
            canonical.push_str(&col.name);
            canonical.push('\u{1e}');
            canonical.push_str(match col.data {
                ColumnData::Numeric(_) => "n",
                ColumnData::Categorical(_) => "c",
            });
            canonical.push('\u{1e}');
            for row in 0..self.rows {
                col.cell_repr(row, &mut canonical);
                canonical.push('\u{1f}');
            }
            canonical.push('\u{1e}');
        }
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}

/// Builder for [`Dataset`], validating that all columns share one length.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    columns: Vec<Column>,
}

impl DatasetBuilder {
    /// Adds a numeric column.
    #[must_use]
    pub fn numeric(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.columns.push(Column::numeric(name, values));
        self
    }

    /// Adds a numeric column with no missing cells.
    #[must_use]
    pub fn numeric_dense(self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.numeric(name, values.into_iter().map(Some).collect())
    }

    /// Adds a categorical column.
    #[must_use]
    pub fn categorical(mut self, name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        self.columns.push(Column::categorical(name, values));
        self
    }

    /// Adds a categorical column with no missing cells.
    #[must_use]
    pub fn categorical_dense(
        self,
        name: impl Into<String>,
        values: Vec<impl Into<String>>,
    ) -> Self {
        self.categorical(name, values.into_iter().map(|v| Some(v.into())).collect())
    }

    /// Adds a pre-built column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Finalizes the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::LengthMismatch`] if any column's length
    /// disagrees with the first column's.
    pub fn build(self) -> Result<Dataset, DatasetError> {
        let rows = self.columns.first().map_or(0, |c| c.data.len());
        for col in &self.columns {
            if col.data.len() != rows {
                return Err(DatasetError::LengthMismatch {
                    column: col.name.clone(),
                    expected: rows,
                    actual: col.data.len(),
                });
            }
        }
        Ok(Dataset {
            columns: self.columns,
            rows,
        })
    }
}

/// Shape and composition summary embedded in quality reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicStatistics {
    /// Number of rows.
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// Number of numeric columns.
    pub numeric_columns: usize,
    /// Number of categorical columns.
    pub categorical_columns: usize,
    /// Total missing cells across all columns.
    pub total_missing: usize,
}

impl From<&Dataset> for BasicStatistics {
    fn from(ds: &Dataset) -> Self {
        let numeric = ds.columns().iter().filter(|c| c.is_numeric()).count();
        Self {
            row_count: ds.n_rows(),
            column_count: ds.n_columns(),
            numeric_columns: numeric,
            categorical_columns: ds.n_columns() - numeric,
            total_missing: ds.total_missing(),
        }
    }
}
