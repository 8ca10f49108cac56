//! The individual quality checks.
//!
//! Each check is a pure function of a dataset and the quality policy,
//! producing one [`CheckResult`]. Checks never raise for bad data; the
//! worst outcome is `issues_found = true` with `severity = High`.

use crate::dataset::stats::{pearson, quantile};
use crate::dataset::{ColumnData, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::config::QualityConfig;

/// How bad a flagged check is for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No issue or cosmetic only.
    Low,
    /// Degrades model quality but the data is usable.
    Medium,
    /// The data should not be trusted without intervention.
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// The fixed set of check categories, in score-reduction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// Per-column missing-value ratios.
    MissingValues,
    /// Exact duplicate rows.
    Duplicates,
    /// IQR-rule outliers in numeric columns.
    Outliers,
    /// Declared types and allowed target labels.
    DataTypes,
    /// Negative values and sanity ceilings.
    ValueRanges,
    /// Structural invariants between correlated columns.
    Consistency,
    /// Required columns present.
    Completeness,
    /// Target classes and minimum sample size.
    Validity,
}

impl CheckCategory {
    /// All categories, in canonical order.
    pub const ALL: [Self; 8] = [
        Self::MissingValues,
        Self::Duplicates,
        Self::Outliers,
        Self::DataTypes,
        Self::ValueRanges,
        Self::Consistency,
        Self::Completeness,
        Self::Validity,
    ];

    /// The category's canonical snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingValues => "missing_values",
            Self::Duplicates => "duplicates",
            Self::Outliers => "outliers",
            Self::DataTypes => "data_types",
            Self::ValueRanges => "value_ranges",
            Self::Consistency => "consistency",
            Self::Completeness => "completeness",
            Self::Validity => "validity",
        }
    }
}

/// The outcome of one check category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check flagged anything.
    pub issues_found: bool,
    /// How bad the flagged issues are. `Low` when clean.
    pub severity: Severity,
    /// Check-specific diagnostic payload.
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl CheckResult {
    /// A clean result with diagnostic details.
    #[must_use]
    pub fn clean(details: HashMap<String, serde_json::Value>) -> Self {
        Self {
            issues_found: false,
            severity: Severity::Low,
            details,
        }
    }

    /// A flagged result.
    #[must_use]
    pub fn flagged(severity: Severity, details: HashMap<String, serde_json::Value>) -> Self {
        Self {
            issues_found: true,
            severity,
            details,
        }
    }

    fn from_issues(
        found: bool,
        severity_when_found: Severity,
        details: HashMap<String, serde_json::Value>,
    ) -> Self {
        if found {
            Self::flagged(severity_when_found, details)
        } else {
            Self::clean(details)
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Flags columns whose missing ratio exceeds the configured threshold.
#[must_use]
pub fn check_missing_values(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let threshold = cfg.thresholds.missing_values_pct;
    let mut missing_pct = serde_json::Map::new();
    let mut problematic = serde_json::Map::new();

    for col in ds.columns() {
        let ratio = pct(col.data.missing_count(), ds.n_rows());
        missing_pct.insert(col.name.clone(), serde_json::json!(round2(ratio)));
        if ratio > threshold {
            problematic.insert(col.name.clone(), serde_json::json!(round2(ratio)));
        }
    }

    let found = !problematic.is_empty();
    let details = HashMap::from([
        ("total_missing".to_string(), serde_json::json!(ds.total_missing())),
        ("missing_percentage".to_string(), serde_json::Value::Object(missing_pct)),
        ("problematic_columns".to_string(), serde_json::Value::Object(problematic)),
        ("threshold_pct".to_string(), serde_json::json!(threshold)),
    ]);
    CheckResult::from_issues(found, Severity::High, details)
}

/// Flags the dataset when the exact-duplicate-row ratio exceeds the
/// configured threshold.
#[must_use]
pub fn check_duplicates(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let threshold = cfg.thresholds.duplicate_rows_pct;
    let duplicates = ds.duplicate_row_count();
    let ratio = pct(duplicates, ds.n_rows());

    let details = HashMap::from([
        ("duplicate_count".to_string(), serde_json::json!(duplicates)),
        ("duplicate_percentage".to_string(), serde_json::json!(round2(ratio))),
        ("threshold_pct".to_string(), serde_json::json!(threshold)),
    ]);
    CheckResult::from_issues(ratio > threshold, Severity::High, details)
}

/// Detects IQR-rule outliers in numeric columns (identifier excluded).
///
/// A cell is an outlier when it falls outside
/// `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` for its column. The aggregate ratio over
/// all numeric cells is compared against the threshold.
#[must_use]
pub fn check_outliers(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let threshold = cfg.thresholds.outliers_pct;
    let mut by_column = serde_json::Map::new();
    let mut total_outliers = 0usize;
    let mut numeric_cols = 0usize;

    for col in ds.columns() {
        if cfg.id_column.as_deref() == Some(col.name.as_str()) {
            continue;
        }
        let Some(values) = col.numeric_values() else {
            continue;
        };
        numeric_cols += 1;
        if values.is_empty() {
            continue;
        }
        let (Some(q1), Some(q3)) = (quantile(&values, 0.25), quantile(&values, 0.75)) else {
            continue;
        };
        let iqr = q3 - q1;
        let lower = q1 - 1.5 * iqr;
        let upper = q3 + 1.5 * iqr;
        let count = values.iter().filter(|&&v| v < lower || v > upper).count();
        if count > 0 {
            by_column.insert(
                col.name.clone(),
                serde_json::json!({
                    "count": count,
                    "percentage": round2(pct(count, ds.n_rows())),
                    "lower_bound": lower,
                    "upper_bound": upper,
                }),
            );
            total_outliers += count;
        }
    }

    let aggregate_pct = if numeric_cols == 0 {
        0.0
    } else {
        pct(total_outliers, ds.n_rows() * numeric_cols)
    };
    let details = HashMap::from([
        ("outliers_by_column".to_string(), serde_json::Value::Object(by_column)),
        ("total_outliers".to_string(), serde_json::json!(total_outliers)),
        ("outliers_percentage".to_string(), serde_json::json!(round2(aggregate_pct))),
        ("threshold_pct".to_string(), serde_json::json!(threshold)),
    ]);
    CheckResult::from_issues(aggregate_pct > threshold, Severity::Medium, details)
}

/// Validates declared types: the target must be categorical and drawn from
/// the allowed label set; every other non-identifier column must be numeric.
#[must_use]
pub fn check_data_types(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let mut issues = Vec::new();

    if let Some(target) = cfg.target_column.as_deref() {
        if let Some(col) = ds.column(target) {
            match col.distinct_categories() {
                Some(labels) if !cfg.valid_target_labels.is_empty() => {
                    let allowed: HashSet<&str> =
                        cfg.valid_target_labels.iter().map(String::as_str).collect();
                    let invalid: Vec<&String> =
                        labels.iter().filter(|l| !allowed.contains(l.as_str())).collect();
                    if !invalid.is_empty() {
                        issues.push(serde_json::json!({
                            "column": target,
                            "issue": "invalid labels",
                            "labels": invalid,
                        }));
                    }
                }
                Some(_) => {}
                None => {
                    issues.push(serde_json::json!({
                        "column": target,
                        "issue": "expected categorical type",
                    }));
                }
            }
        }
    }

    for col in ds.columns() {
        let is_id = cfg.id_column.as_deref() == Some(col.name.as_str());
        let is_target = cfg.target_column.as_deref() == Some(col.name.as_str());
        if !is_id && !is_target && !col.is_numeric() {
            issues.push(serde_json::json!({
                "column": col.name,
                "issue": "expected numeric type",
            }));
        }
    }

    let found = !issues.is_empty();
    let details = HashMap::from([(
        "type_issues".to_string(),
        serde_json::Value::Array(issues),
    )]);
    CheckResult::from_issues(found, Severity::High, details)
}

/// Flags negative values and values beyond the sanity ceiling in numeric
/// columns (identifier excluded). Applies to domains where all quantities
/// are physically non-negative.
#[must_use]
pub fn check_value_ranges(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let mut issues = Vec::new();

    for col in ds.columns() {
        if cfg.id_column.as_deref() == Some(col.name.as_str()) {
            continue;
        }
        let Some(values) = col.numeric_values() else {
            continue;
        };
        if values.is_empty() {
            continue;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min < 0.0 {
            issues.push(serde_json::json!({
                "column": col.name,
                "issue": "negative values found",
                "min_value": min,
            }));
        }
        if max > cfg.value_ceiling {
            issues.push(serde_json::json!({
                "column": col.name,
                "issue": "extremely large values",
                "max_value": max,
            }));
        }
    }

    let found = !issues.is_empty();
    let details = HashMap::from([(
        "range_issues".to_string(),
        serde_json::Value::Array(issues),
    )]);
    CheckResult::from_issues(found, Severity::Medium, details)
}

fn paired_values(ds: &Dataset, a: &str, b: &str) -> Option<(Vec<f64>, Vec<f64>)> {
    let (ColumnData::Numeric(xs), ColumnData::Numeric(ys)) =
        (&ds.column(a)?.data, &ds.column(b)?.data)
    else {
        return None;
    };
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (x, y) in xs.iter().zip(ys) {
        if let (Some(x), Some(y)) = (x, y) {
            left.push(*x);
            right.push(*y);
        }
    }
    Some((left, right))
}

fn identifier_duplicates(ds: &Dataset, id: &str) -> usize {
    let Some(col) = ds.column(id) else { return 0 };
    let mut seen = HashSet::new();
    let mut dup = 0;
    match &col.data {
        ColumnData::Numeric(values) => {
            for v in values.iter().flatten() {
                if !seen.insert(format!("{v:?}")) {
                    dup += 1;
                }
            }
        }
        ColumnData::Categorical(values) => {
            for v in values.iter().flatten() {
                if !seen.insert(v.clone()) {
                    dup += 1;
                }
            }
        }
    }
    dup
}

/// Checks structural invariants: the identifier column must be unique and
/// declared column pairs must correlate positively.
#[must_use]
pub fn check_consistency(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let mut issues = Vec::new();

    if let Some(id) = cfg.id_column.as_deref() {
        let dup = identifier_duplicates(ds, id);
        if dup > 0 {
            issues.push(serde_json::json!({
                "issue": "duplicate identifiers",
                "column": id,
                "count": dup,
            }));
        }
    }

    for (a, b) in &cfg.correlated_pairs {
        let Some((xs, ys)) = paired_values(ds, a, b) else {
            continue;
        };
        if let Some(r) = pearson(&xs, &ys) {
            if r < cfg.min_pair_correlation {
                issues.push(serde_json::json!({
                    "issue": "weak correlation between paired columns",
                    "columns": [a, b],
                    "correlation": r,
                }));
            }
        }
    }

    let found = !issues.is_empty();
    let details = HashMap::from([(
        "consistency_issues".to_string(),
        serde_json::Value::Array(issues),
    )]);
    CheckResult::from_issues(found, Severity::High, details)
}

/// Verifies that every required column is present.
#[must_use]
pub fn check_completeness(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let missing: Vec<&String> = cfg
        .required_columns
        .iter()
        .filter(|c| !ds.has_column(c))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let score = if cfg.required_columns.is_empty() {
        1.0
    } else {
        (cfg.required_columns.len() - missing.len()) as f64 / cfg.required_columns.len() as f64
    };

    let found = !missing.is_empty();
    let details = HashMap::from([
        ("missing_columns".to_string(), serde_json::json!(missing)),
        ("completeness_score".to_string(), serde_json::json!(score)),
    ]);
    CheckResult::from_issues(found, Severity::High, details)
}

/// Business-validity rules: the target needs at least two classes and the
/// dataset must meet the minimum sample-size floor.
#[must_use]
pub fn check_validity(ds: &Dataset, cfg: &QualityConfig) -> CheckResult {
    let mut issues = Vec::new();

    if let Some(target) = cfg.target_column.as_deref() {
        if let Some(col) = ds.column(target) {
            let distinct = match &col.data {
                ColumnData::Categorical(_) => col.distinct_categories().unwrap_or_default(),
                ColumnData::Numeric(values) => {
                    let mut seen = HashSet::new();
                    values
                        .iter()
                        .flatten()
                        .filter(|v| seen.insert(format!("{v:?}")))
                        .map(|v| format!("{v:?}"))
                        .collect()
                }
            };
            if distinct.len() < 2 {
                issues.push(serde_json::json!({
                    "issue": "target variable has fewer than 2 classes",
                    "unique_values": distinct,
                }));
            }
        }
    }

    if ds.n_rows() < cfg.min_sample_size {
        issues.push(serde_json::json!({
            "issue": "dataset below minimum sample size",
            "current_size": ds.n_rows(),
            "minimum_required": cfg.min_sample_size,
        }));
    }

    let found = !issues.is_empty();
    let details = HashMap::from([(
        "validity_issues".to_string(),
        serde_json::Value::Array(issues),
    )]);
    CheckResult::from_issues(found, Severity::High, details)
}
