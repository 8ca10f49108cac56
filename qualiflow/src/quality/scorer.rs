//! The composite quality scorer.

use crate::dataset::{BasicStatistics, Dataset};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::info;

use super::checks::{
    check_completeness, check_consistency, check_data_types, check_duplicates,
    check_missing_values, check_outliers, check_validity, check_value_ranges, CheckCategory,
    CheckResult,
};
use super::config::QualityConfig;
use super::report::{level_for_score, score_from_checks, QualityReport};

/// Runs the fixed battery of checks against a dataset and reduces them to
/// one composite score and severity classification.
///
/// Deterministic and side-effect-free apart from the in-memory check
/// history; persistence is a separate, explicit call on
/// [`crate::persist::ReportStore`].
pub struct DataQualityScorer {
    config: QualityConfig,
    history: RwLock<Vec<QualityReport>>,
}

impl DataQualityScorer {
    /// Creates a scorer with the given policy.
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Returns the scorer's policy.
    #[must_use]
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Runs all checks and assembles the quality report.
    ///
    /// A threshold violation is a classification outcome, never an error:
    /// the caller decides whether to gate on `overall_score`.
    pub fn run_checks(&self, dataset: &Dataset, dataset_name: &str) -> QualityReport {
        info!(dataset = dataset_name, rows = dataset.n_rows(), "running quality checks");

        let cfg = &self.config;
        let mut checks: BTreeMap<String, CheckResult> = BTreeMap::new();
        checks.insert(
            CheckCategory::MissingValues.as_str().to_string(),
            check_missing_values(dataset, cfg),
        );
        checks.insert(
            CheckCategory::Duplicates.as_str().to_string(),
            check_duplicates(dataset, cfg),
        );
        checks.insert(
            CheckCategory::Outliers.as_str().to_string(),
            check_outliers(dataset, cfg),
        );
        checks.insert(
            CheckCategory::DataTypes.as_str().to_string(),
            check_data_types(dataset, cfg),
        );
        checks.insert(
            CheckCategory::ValueRanges.as_str().to_string(),
            check_value_ranges(dataset, cfg),
        );
        checks.insert(
            CheckCategory::Consistency.as_str().to_string(),
            check_consistency(dataset, cfg),
        );
        checks.insert(
            CheckCategory::Completeness.as_str().to_string(),
            check_completeness(dataset, cfg),
        );
        checks.insert(
            CheckCategory::Validity.as_str().to_string(),
            check_validity(dataset, cfg),
        );

        let overall_score = score_from_checks(&checks, &cfg.penalties);
        let report = QualityReport {
            dataset_name: dataset_name.to_string(),
            timestamp: chrono::Utc::now(),
            data_hash: dataset.data_hash(),
            basic_statistics: BasicStatistics::from(dataset),
            checks,
            overall_score,
            quality_level: level_for_score(overall_score),
        };

        info!(
            dataset = dataset_name,
            score = report.overall_score,
            level = %report.quality_level,
            "quality checks finished"
        );
        self.history.write().push(report.clone());
        report
    }

    /// Returns a copy of all reports produced by this scorer.
    #[must_use]
    pub fn history(&self) -> Vec<QualityReport> {
        self.history.read().clone()
    }
}

impl std::fmt::Debug for DataQualityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataQualityScorer")
            .field("config", &self.config)
            .field("history_len", &self.history.read().len())
            .finish()
    }
}
