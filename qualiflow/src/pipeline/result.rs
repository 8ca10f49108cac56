//! Stage and run result envelopes.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage completed successfully.
    Ok,
    /// Stage failed.
    Failed,
    /// Stage was skipped.
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status does not fail the run.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Skipped)
    }
}

/// The typed envelope every stage returns.
///
/// Never mutated after creation; the orchestrator consumes it to decide
/// graph progression and publishes `outputs` to the artifact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced this result.
    pub stage: String,
    /// Terminal status of the execution.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: Timestamp,
    /// When the stage ended.
    pub ended_at: Timestamp,
    /// Values to publish under the stage's namespace, keyed by output key.
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
    /// Structured diagnostics for the audit trail.
    #[serde(default)]
    pub diagnostics: HashMap<String, serde_json::Value>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a successful result with outputs.
    #[must_use]
    pub fn ok(
        stage: impl Into<String>,
        started_at: Timestamp,
        outputs: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Ok,
            started_at,
            ended_at: chrono::Utc::now(),
            outputs,
            diagnostics: HashMap::new(),
            error: None,
        }
    }

    /// Creates a successful result with no outputs.
    #[must_use]
    pub fn ok_empty(stage: impl Into<String>, started_at: Timestamp) -> Self {
        Self::ok(stage, started_at, HashMap::new())
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        started_at: Timestamp,
        error: impl Into<String>,
    ) -> Self {
        let error = error.into();
        let mut diagnostics = HashMap::new();
        diagnostics.insert("error".to_string(), serde_json::json!(error.clone()));
        Self {
            stage: stage.into(),
            status: StageStatus::Failed,
            started_at,
            ended_at: chrono::Utc::now(),
            outputs: HashMap::new(),
            diagnostics,
            error: Some(error),
        }
    }

    /// Creates a skipped result.
    #[must_use]
    pub fn skipped(
        stage: impl Into<String>,
        started_at: Timestamp,
        reason: impl Into<String>,
    ) -> Self {
        let mut diagnostics = HashMap::new();
        diagnostics.insert("skip_reason".to_string(), serde_json::json!(reason.into()));
        Self {
            stage: stage.into(),
            status: StageStatus::Skipped,
            started_at,
            ended_at: chrono::Utc::now(),
            outputs: HashMap::new(),
            diagnostics,
            error: None,
        }
    }

    /// Attaches a diagnostic entry.
    #[must_use]
    pub fn with_diagnostic(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.diagnostics.insert(key.into(), value);
        self
    }

    /// Returns the execution duration in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == StageStatus::Ok
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// The run-level state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RunState {
    /// No stage has started yet.
    Pending,
    /// A stage is currently executing.
    Running {
        /// The executing stage.
        stage: String,
    },
    /// All stages finished ok or were skipped by their own choice.
    Completed,
    /// At least one non-cleanup stage failed, or a fatal error aborted
    /// the run.
    Failed,
}

impl RunState {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// What the orchestrator hands back to the scheduler boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The run identifier.
    pub run_id: String,
    /// Terminal run state.
    pub state: RunState,
    /// Per-stage results in execution order.
    pub stage_results: Vec<StageResult>,
    /// Top-level error summary for a failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Returns the result for one stage, if it ran.
    #[must_use]
    pub fn stage_result(&self, stage: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }

    /// Process exit code for the scheduler boundary: 0 on `Completed`,
    /// non-zero otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_completed())
    }
}
