//! Report and stage-summary persistence.
//!
//! Persisted state layout:
//! - one `QualityReport` JSON per run per dataset name, addressed by
//!   `{dataset_name}_{timestamp}.json` (plus a text rendering alongside)
//! - one `StageResult` summary per stage per run, addressed by
//!   `{run_id}/{stage_id}.json`

use crate::errors::PipelineError;
use crate::pipeline::StageResult;
use crate::quality::QualityReport;
use crate::utils::compact_timestamp;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::info;

/// Writes reports and stage summaries as JSON documents under a root
/// directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    /// Creates a report store rooted at `root`, creating the directory if
    /// needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists a quality report as JSON plus a text rendering.
    ///
    /// Returns the path of the JSON document.
    pub fn save_quality_report(&self, report: &QualityReport) -> Result<PathBuf, PipelineError> {
        let stem = format!(
            "{}_{}",
            report.dataset_name,
            compact_timestamp(&report.timestamp)
        );
        let json_path = self.root.join(format!("{stem}.json"));
        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

        let text_path = self.root.join(format!("{stem}_report.txt"));
        fs::write(&text_path, report.render_text())?;

        info!(path = %json_path.display(), "quality report saved");
        Ok(json_path)
    }

    /// Persists a stage-result summary under `{run_id}/{stage_id}.json`.
    pub fn save_stage_result(
        &self,
        run_id: &str,
        result: &StageResult,
    ) -> Result<PathBuf, PipelineError> {
        let run_dir = self.root.join(run_id);
        fs::create_dir_all(&run_dir)?;
        let path = run_dir.join(format!("{}.json", result.stage));
        fs::write(&path, serde_json::to_string_pretty(result)?)?;
        Ok(path)
    }

    /// Loads a stage-result summary, if present.
    pub fn load_stage_result(
        &self,
        run_id: &str,
        stage_id: &str,
    ) -> Result<Option<StageResult>, PipelineError> {
        let path = self.root.join(run_id).join(format!("{stage_id}.json"));
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Removes top-level report files older than `max_age_days`.
    ///
    /// Returns the number of deleted files. Run directories holding stage
    /// summaries are left untouched.
    pub fn cleanup_old_reports(&self, max_age_days: u64) -> Result<usize, PipelineError> {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(max_age_days * 24 * 60 * 60))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut deleted = 0usize;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if modified < cutoff {
                fs::remove_file(&path)?;
                deleted += 1;
            }
        }

        info!(deleted, max_age_days, "old reports removed");
        Ok(deleted)
    }
}
