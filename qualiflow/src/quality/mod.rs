//! Data-quality scoring and drift detection.
//!
//! [`DataQualityScorer`] runs a fixed battery of checks over a dataset and
//! reduces them to one composite score and severity classification.
//! [`DriftDetector`] compares a reference dataset against a current one,
//! column by column. Neither ever raises for a threshold violation: a bad
//! score is a classification outcome, not an error.

mod checks;
mod config;
mod drift;
mod report;
mod scorer;

pub use checks::{
    check_completeness, check_consistency, check_data_types, check_duplicates,
    check_missing_values, check_outliers, check_validity, check_value_ranges, CheckCategory,
    CheckResult, Severity,
};
pub use config::{PenaltyWeights, QualityConfig, QualityThresholds};
pub use drift::{ks_2samp, DriftConfig, DriftDetector, DriftReport, FeatureDrift};
pub use report::{level_for_score, score_from_checks, QualityLevel, QualityReport};
pub use scorer::DataQualityScorer;
