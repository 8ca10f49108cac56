//! Quality report assembly: score reduction and level classification.

use crate::dataset::BasicStatistics;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::checks::{CheckCategory, CheckResult};
use super::config::PenaltyWeights;

/// Quality classification derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    /// Score >= 90.
    Excellent,
    /// Score >= 80.
    Good,
    /// Score >= 70.
    Acceptable,
    /// Score >= 60.
    Poor,
    /// Score < 60.
    Critical,
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Acceptable => write!(f, "acceptable"),
            Self::Poor => write!(f, "poor"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Reduces a set of check results to one score in `[0, 100]`.
///
/// Starts at 100 and subtracts the configured penalty for every category
/// whose check flagged issues. A pure function of the check results: no
/// dataset or hidden state involved.
#[must_use]
pub fn score_from_checks(
    checks: &BTreeMap<String, CheckResult>,
    penalties: &PenaltyWeights,
) -> f64 {
    let mut score = 100.0;
    for category in CheckCategory::ALL {
        if let Some(result) = checks.get(category.as_str()) {
            if result.issues_found {
                score -= penalties.for_category(category);
            }
        }
    }
    score.clamp(0.0, 100.0)
}

/// Maps a score to its quality level via fixed breakpoints.
#[must_use]
pub fn level_for_score(score: f64) -> QualityLevel {
    if score >= 90.0 {
        QualityLevel::Excellent
    } else if score >= 80.0 {
        QualityLevel::Good
    } else if score >= 70.0 {
        QualityLevel::Acceptable
    } else if score >= 60.0 {
        QualityLevel::Poor
    } else {
        QualityLevel::Critical
    }
}

/// The permanent audit record for one dataset snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// The dataset's logical name.
    pub dataset_name: String,
    /// When the checks ran.
    pub timestamp: Timestamp,
    /// Content hash of the checked dataset.
    pub data_hash: String,
    /// Shape and composition summary.
    pub basic_statistics: BasicStatistics,
    /// One result per check category, keyed by category name.
    pub checks: BTreeMap<String, CheckResult>,
    /// Composite score in `[0, 100]`.
    pub overall_score: f64,
    /// Classification of the score.
    pub quality_level: QualityLevel,
}

impl QualityReport {
    /// Returns the result of one check category, if present.
    #[must_use]
    pub fn check(&self, category: CheckCategory) -> Option<&CheckResult> {
        self.checks.get(category.as_str())
    }

    /// Renders the report as a human-readable text summary.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== DATA QUALITY REPORT ===");
        let _ = writeln!(out, "Dataset: {}", self.dataset_name);
        let _ = writeln!(out, "Checked at: {}", self.timestamp.to_rfc3339());
        let _ = writeln!(out, "Data hash: {}", self.data_hash);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "OVERALL QUALITY SCORE: {:.1}/100 ({})",
            self.overall_score,
            self.quality_level.to_string().to_uppercase()
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "BASIC STATISTICS:");
        let _ = writeln!(
            out,
            "  Rows: {}, Columns: {}",
            self.basic_statistics.row_count, self.basic_statistics.column_count
        );
        let _ = writeln!(
            out,
            "  Numeric columns: {}, Categorical columns: {}",
            self.basic_statistics.numeric_columns, self.basic_statistics.categorical_columns
        );
        let _ = writeln!(out);
        for category in CheckCategory::ALL {
            let Some(result) = self.checks.get(category.as_str()) else {
                continue;
            };
            let name = category.as_str().to_uppercase();
            if result.issues_found {
                let _ = writeln!(
                    out,
                    "{name}: ISSUES FOUND ({})",
                    result.severity.to_string().to_uppercase()
                );
            } else {
                let _ = writeln!(out, "{name}: OK");
            }
        }
        out
    }
}
