//! Built-in pipeline stages.
//!
//! These cover the pipeline-glue duties of a data-to-model workflow: load
//! and validate the source, score its quality, preprocess it into splits,
//! and clean up after the run. Model training and evaluation remain
//! external collaborators plugged in as their own [`Stage`] impls.

use super::{Stage, StageContext};
use crate::dataset::stats::median;
use crate::dataset::{Column, ColumnData, Dataset};
use crate::errors::PipelineError;
use crate::persist::ReportStore;
use crate::pipeline::StageResult;
use crate::quality::{DataQualityScorer, QualityConfig};
use crate::source::SourceLoader;
use crate::store::ArtifactStore;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Loads the run's source dataset and publishes it as the raw artifact.
pub struct LoadStage {
    loader: Arc<dyn SourceLoader>,
}

impl LoadStage {
    /// Output key for the raw dataset.
    pub const RAW_DATASET: &'static str = "raw_dataset";

    /// Creates a load stage backed by the given loader.
    #[must_use]
    pub fn new(loader: Arc<dyn SourceLoader>) -> Self {
        Self { loader }
    }
}

impl std::fmt::Debug for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadStage").finish()
    }
}

#[async_trait]
impl Stage for LoadStage {
    fn name(&self) -> &str {
        "load"
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let started = chrono::Utc::now();
        let dataset = match self.loader.load(ctx.source_ref()).await {
            Ok(ds) => ds,
            Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
        };
        if dataset.is_empty() {
            return StageResult::failed(
                ctx.stage_id(),
                started,
                format!("source '{}' produced an empty dataset", ctx.source_ref()),
            );
        }

        info!(
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            source = ctx.source_ref(),
            "dataset loaded"
        );
        let hash = dataset.data_hash();
        let value = match serde_json::to_value(&dataset) {
            Ok(v) => v,
            Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
        };
        let mut outputs = HashMap::new();
        outputs.insert(Self::RAW_DATASET.to_string(), value);
        StageResult::ok(ctx.stage_id(), started, outputs)
            .with_diagnostic("rows", serde_json::json!(dataset.n_rows()))
            .with_diagnostic("columns", serde_json::json!(dataset.n_columns()))
            .with_diagnostic("data_hash", serde_json::json!(hash))
    }
}

/// Scores the quality of its input dataset and publishes the report.
///
/// A low score is never a failure here; it is recorded in the report and
/// the diagnostics so the caller can gate on it.
pub struct QualityCheckStage {
    scorer: DataQualityScorer,
    dataset_name: String,
    report_store: Option<Arc<ReportStore>>,
}

impl QualityCheckStage {
    /// Input alias for the dataset to score.
    pub const DATASET: &'static str = "dataset";
    /// Output key for the quality report.
    pub const QUALITY_REPORT: &'static str = "quality_report";

    /// Creates a quality-check stage.
    #[must_use]
    pub fn new(config: QualityConfig, dataset_name: impl Into<String>) -> Self {
        Self {
            scorer: DataQualityScorer::new(config),
            dataset_name: dataset_name.into(),
            report_store: None,
        }
    }

    /// Persists every produced report through the given store.
    #[must_use]
    pub fn with_report_store(mut self, store: Arc<ReportStore>) -> Self {
        self.report_store = Some(store);
        self
    }
}

impl std::fmt::Debug for QualityCheckStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityCheckStage")
            .field("dataset_name", &self.dataset_name)
            .finish()
    }
}

#[async_trait]
impl Stage for QualityCheckStage {
    fn name(&self) -> &str {
        "data_quality_check"
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let started = chrono::Utc::now();
        let dataset = match ctx.dataset_input(Self::DATASET) {
            Ok(ds) => ds,
            Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
        };

        let report = self.scorer.run_checks(&dataset, &self.dataset_name);
        if report.overall_score < 60.0 {
            warn!(
                dataset = self.dataset_name,
                score = report.overall_score,
                "quality score is critical; consider improving the data before proceeding"
            );
        }

        if let Some(store) = &self.report_store {
            if let Err(e) = store.save_quality_report(&report) {
                warn!(error = %e, "failed to persist quality report");
            }
        }

        let score = report.overall_score;
        let level = report.quality_level;
        let value = match serde_json::to_value(&report) {
            Ok(v) => v,
            Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
        };
        let mut outputs = HashMap::new();
        outputs.insert(Self::QUALITY_REPORT.to_string(), value);
        StageResult::ok(ctx.stage_id(), started, outputs)
            .with_diagnostic("overall_score", serde_json::json!(score))
            .with_diagnostic("quality_level", serde_json::json!(level))
    }
}

/// Deduplicates, imputes, and splits the raw dataset into train/test.
///
/// The transform is pure and seeded, so a fallback recomputation produces
/// a split equivalent to the lost artifact.
#[derive(Debug, Clone)]
pub struct PreprocessStage {
    target_column: String,
    test_fraction: f64,
    seed: u64,
}

impl PreprocessStage {
    /// Input alias for the raw dataset.
    pub const DATASET: &'static str = "dataset";
    /// Output key for the training split.
    pub const TRAIN_DATASET: &'static str = "train_dataset";
    /// Output key for the test split.
    pub const TEST_DATASET: &'static str = "test_dataset";

    /// Creates a preprocess stage.
    #[must_use]
    pub fn new(target_column: impl Into<String>, test_fraction: f64, seed: u64) -> Self {
        Self {
            target_column: target_column.into(),
            test_fraction,
            seed,
        }
    }

    /// The pure preprocessing transform: duplicate removal, median
    /// imputation of numeric columns, seeded shuffle split.
    ///
    /// Exposed so a fallback producer can re-derive the splits from the
    /// original source.
    pub fn transform(
        dataset: &Dataset,
        target_column: &str,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(Dataset, Dataset), PipelineError> {
        if !dataset.has_column(target_column) {
            return Err(PipelineError::stage(
                "preprocess",
                format!("target column '{target_column}' not found"),
            ));
        }
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(PipelineError::stage(
                "preprocess",
                format!("test fraction {test_fraction} outside [0, 1)"),
            ));
        }

        let deduped = dataset.drop_duplicates();
        let imputed = impute_numeric_medians(&deduped)?;

        let mut indices: Vec<usize> = (0..imputed.n_rows()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let test_len = (imputed.n_rows() as f64 * test_fraction).round() as usize;
        let (test_idx, train_idx) = indices.split_at(test_len.min(indices.len()));

        Ok((imputed.select_rows(train_idx), imputed.select_rows(test_idx)))
    }
}

fn impute_numeric_medians(dataset: &Dataset) -> Result<Dataset, PipelineError> {
    let mut builder = Dataset::builder();
    for col in dataset.columns() {
        let column = match &col.data {
            ColumnData::Numeric(values) => {
                let present: Vec<f64> = values.iter().filter_map(|c| *c).collect();
                match median(&present) {
                    Some(med) => Column::numeric(
                        col.name.clone(),
                        values.iter().map(|c| Some(c.unwrap_or(med))).collect(),
                    ),
                    // Entirely missing column: nothing to impute from.
                    None => col.clone(),
                }
            }
            ColumnData::Categorical(_) => col.clone(),
        };
        builder = builder.column(column);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl Stage for PreprocessStage {
    fn name(&self) -> &str {
        "preprocess"
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let started = chrono::Utc::now();
        let dataset = match ctx.dataset_input(Self::DATASET) {
            Ok(ds) => ds,
            Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
        };

        let (train, test) =
            match Self::transform(&dataset, &self.target_column, self.test_fraction, self.seed) {
                Ok(splits) => splits,
                Err(e) => return StageResult::failed(ctx.stage_id(), started, e.to_string()),
            };

        info!(
            train_rows = train.n_rows(),
            test_rows = test.n_rows(),
            seed = self.seed,
            "preprocessing finished"
        );
        let (train_rows, test_rows) = (train.n_rows(), test.n_rows());
        let (train_value, test_value) =
            match (serde_json::to_value(&train), serde_json::to_value(&test)) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => {
                    return StageResult::failed(ctx.stage_id(), started, e.to_string())
                }
            };
        let mut outputs = HashMap::new();
        outputs.insert(Self::TRAIN_DATASET.to_string(), train_value);
        outputs.insert(Self::TEST_DATASET.to_string(), test_value);
        StageResult::ok(ctx.stage_id(), started, outputs)
            .with_diagnostic("train_rows", serde_json::json!(train_rows))
            .with_diagnostic("test_rows", serde_json::json!(test_rows))
            .with_diagnostic("seed", serde_json::json!(self.seed))
    }
}

/// Removes the run's artifacts and stale report files.
///
/// Declared `always_run` in the graph so it executes regardless of prior
/// failures. Its own failures never fail the run; they surface as
/// diagnostics only.
pub struct CleanupStage {
    store: Arc<dyn ArtifactStore>,
    report_store: Option<Arc<ReportStore>>,
    max_age_days: u64,
    purge_run_artifacts: bool,
}

impl CleanupStage {
    /// Creates a cleanup stage purging the run's artifacts.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            report_store: None,
            max_age_days: 30,
            purge_run_artifacts: true,
        }
    }

    /// Also removes report files older than `max_age_days`.
    #[must_use]
    pub fn with_report_store(mut self, store: Arc<ReportStore>, max_age_days: u64) -> Self {
        self.report_store = Some(store);
        self.max_age_days = max_age_days;
        self
    }

    /// Keeps the run's artifacts in place (only old reports are removed).
    #[must_use]
    pub fn keep_run_artifacts(mut self) -> Self {
        self.purge_run_artifacts = false;
        self
    }
}

impl std::fmt::Debug for CleanupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupStage")
            .field("max_age_days", &self.max_age_days)
            .field("purge_run_artifacts", &self.purge_run_artifacts)
            .finish()
    }
}

#[async_trait]
impl Stage for CleanupStage {
    fn name(&self) -> &str {
        "cleanup"
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        let started = chrono::Utc::now();
        let mut result = StageResult::ok_empty(ctx.stage_id(), started);

        if self.purge_run_artifacts {
            match self.store.delete_run(ctx.run_id()) {
                Ok(count) => {
                    result = result.with_diagnostic("deleted_artifacts", serde_json::json!(count));
                }
                Err(e) => {
                    warn!(error = %e, "failed to purge run artifacts");
                    result = result
                        .with_diagnostic("artifact_purge_error", serde_json::json!(e.to_string()));
                }
            }
        }

        if let Some(reports) = &self.report_store {
            match reports.cleanup_old_reports(self.max_age_days) {
                Ok(count) => {
                    result = result.with_diagnostic("deleted_reports", serde_json::json!(count));
                }
                Err(e) => {
                    warn!(error = %e, "failed to remove old reports");
                    result = result
                        .with_diagnostic("report_cleanup_error", serde_json::json!(e.to_string()));
                }
            }
        }

        info!(run_id = ctx.run_id(), "cleanup finished");
        result
    }
}
