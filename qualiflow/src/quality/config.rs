//! Quality-check configuration.
//!
//! An explicit, immutable configuration object passed to the scorer at
//! construction. There is no process-wide singleton; two scorers with
//! different policies can coexist in one process.

use serde::{Deserialize, Serialize};

use super::checks::CheckCategory;

/// Percentage thresholds above which a ratio-based check flags issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Maximum tolerated per-column missing ratio, in percent.
    pub missing_values_pct: f64,
    /// Maximum tolerated exact-duplicate-row ratio, in percent.
    pub duplicate_rows_pct: f64,
    /// Maximum tolerated aggregate outlier ratio, in percent.
    pub outliers_pct: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            missing_values_pct: 5.0,
            duplicate_rows_pct: 1.0,
            outliers_pct: 10.0,
        }
    }
}

/// Score penalty per failed check category.
///
/// Ordered by business impact: completeness and validity weigh most,
/// outliers least. Tunable policy, not derived constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    /// Penalty when the missing-values check flags issues.
    pub missing_values: f64,
    /// Penalty when the duplicates check flags issues.
    pub duplicates: f64,
    /// Penalty when the outliers check flags issues.
    pub outliers: f64,
    /// Penalty when the type-validity check flags issues.
    pub data_types: f64,
    /// Penalty when the value-ranges check flags issues.
    pub value_ranges: f64,
    /// Penalty when the consistency check flags issues.
    pub consistency: f64,
    /// Penalty when the completeness check flags issues.
    pub completeness: f64,
    /// Penalty when the validity check flags issues.
    pub validity: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            missing_values: 20.0,
            duplicates: 15.0,
            outliers: 10.0,
            data_types: 25.0,
            value_ranges: 15.0,
            consistency: 20.0,
            completeness: 30.0,
            validity: 25.0,
        }
    }
}

impl PenaltyWeights {
    /// Returns the penalty for one check category.
    #[must_use]
    pub fn for_category(&self, category: CheckCategory) -> f64 {
        match category {
            CheckCategory::MissingValues => self.missing_values,
            CheckCategory::Duplicates => self.duplicates,
            CheckCategory::Outliers => self.outliers,
            CheckCategory::DataTypes => self.data_types,
            CheckCategory::ValueRanges => self.value_ranges,
            CheckCategory::Consistency => self.consistency,
            CheckCategory::Completeness => self.completeness,
            CheckCategory::Validity => self.validity,
        }
    }
}

/// Full quality policy: thresholds, penalties, and the schema contract the
/// dataset is checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Ratio thresholds.
    pub thresholds: QualityThresholds,
    /// Score penalties.
    pub penalties: PenaltyWeights,
    /// Unique-identifier column, excluded from numeric checks.
    pub id_column: Option<String>,
    /// Categorical target column.
    pub target_column: Option<String>,
    /// The fixed label set the target must be drawn from. Empty = any.
    pub valid_target_labels: Vec<String>,
    /// Columns that must be present for the dataset to be complete.
    pub required_columns: Vec<String>,
    /// Column pairs expected to be strongly positively correlated.
    pub correlated_pairs: Vec<(String, String)>,
    /// Minimum accepted Pearson correlation for declared pairs.
    pub min_pair_correlation: f64,
    /// Minimum row count for a usable dataset.
    pub min_sample_size: usize,
    /// Sanity ceiling for domains where all quantities are bounded.
    pub value_ceiling: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            thresholds: QualityThresholds::default(),
            penalties: PenaltyWeights::default(),
            id_column: Some("id".to_string()),
            target_column: None,
            valid_target_labels: Vec::new(),
            required_columns: Vec::new(),
            correlated_pairs: Vec::new(),
            min_pair_correlation: 0.5,
            min_sample_size: 100,
            value_ceiling: 10_000.0,
        }
    }
}

impl QualityConfig {
    /// Sets the target column and its allowed labels.
    #[must_use]
    pub fn with_target(
        mut self,
        column: impl Into<String>,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.target_column = Some(column.into());
        self.valid_target_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the required columns.
    #[must_use]
    pub fn with_required_columns(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Declares a pair of columns expected to correlate positively.
    #[must_use]
    pub fn with_correlated_pair(
        mut self,
        a: impl Into<String>,
        b: impl Into<String>,
    ) -> Self {
        self.correlated_pairs.push((a.into(), b.into()));
        self
    }

    /// Sets the identifier column.
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Sets the minimum sample size.
    #[must_use]
    pub fn with_min_sample_size(mut self, rows: usize) -> Self {
        self.min_sample_size = rows;
        self
    }
}
