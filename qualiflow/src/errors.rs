//! Error types for the qualiflow pipeline core.
//!
//! The taxonomy is deliberately small: only [`PipelineError::SourceUnavailable`]
//! and [`PipelineError::StoreUnavailable`] abort a run outright. Everything
//! else degrades into structured diagnostics on a stage result so a run
//! completes with a full audit trail even when quality is poor.

use thiserror::Error;

/// The main error type for qualiflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pipeline graph failed validation at construction time.
    #[error("{0}")]
    Validation(#[from] GraphValidationError),

    /// The original upstream source cannot be reached; fatal for the run.
    #[error("source '{reference}' unavailable: {reason}")]
    SourceUnavailable {
        /// The source reference that could not be loaded.
        reference: String,
        /// Why the load failed.
        reason: String,
    },

    /// The artifact store infrastructure is down; fatal for the run.
    #[error("artifact store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stage's own logic failed (e.g., malformed input shape).
    ///
    /// Recorded in the stage's diagnostics and propagated to a `Failed`
    /// run state, but the cleanup stage still runs.
    #[error("stage '{stage}' failed: {message}")]
    StageExecution {
        /// The stage that failed.
        stage: String,
        /// What went wrong.
        message: String,
    },

    /// A dataset operation failed.
    #[error("{0}")]
    Dataset(#[from] DatasetError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a stage execution error.
    #[must_use]
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a source-unavailable error.
    #[must_use]
    pub fn source_unavailable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error must abort the run immediately.
    ///
    /// Only source and store unavailability are fatal; all other
    /// conditions become diagnostics.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::StoreUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a stage graph fails construction-time validation.
///
/// Cyclic graphs, unknown dependencies, and inputs without a declared
/// producer are construction-time errors, never runtime ones.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GraphValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl GraphValidationError {
    /// Creates a new graph validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// A dependency cycle was found; `path` lists the stages forming it.
    #[must_use]
    pub fn cycle(path: Vec<String>) -> Self {
        Self {
            message: format!("cycle detected in stage graph: {}", path.join(" -> ")),
            stages: path,
        }
    }

    /// Two stages were registered under the same name.
    #[must_use]
    pub fn duplicate_stage(name: &str) -> Self {
        Self {
            message: format!("duplicate stage '{name}'"),
            stages: vec![name.to_string()],
        }
    }

    /// A stage depends on a stage that does not exist in the graph.
    #[must_use]
    pub fn unknown_dependency(stage: &str, dependency: &str) -> Self {
        Self {
            message: format!("stage '{stage}' depends on unknown stage '{dependency}'"),
            stages: vec![stage.to_string(), dependency.to_string()],
        }
    }

    /// A declared input names a producer stage that does not exist.
    #[must_use]
    pub fn unknown_producer(stage: &str, producer: &str, key: &str) -> Self {
        Self {
            message: format!(
                "stage '{stage}' declares input '{key}' from unknown stage '{producer}'"
            ),
            stages: vec![stage.to_string(), producer.to_string()],
        }
    }

    /// A declared input names a key its producer never declares as output.
    #[must_use]
    pub fn undeclared_output(stage: &str, producer: &str, key: &str) -> Self {
        Self {
            message: format!(
                "stage '{stage}' expects '{key}' from '{producer}', which does not declare it as an output"
            ),
            stages: vec![stage.to_string(), producer.to_string()],
        }
    }
}

/// Errors raised by source loaders.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source cannot be reached at all.
    #[error("source '{reference}' is unreachable: {reason}")]
    Unreachable {
        /// The source reference.
        reference: String,
        /// Why it could not be reached.
        reason: String,
    },

    /// The source was reached but its content is unusable.
    #[error("source '{reference}' is malformed: {reason}")]
    Malformed {
        /// The source reference.
        reference: String,
        /// What was wrong with the content.
        reason: String,
    },
}

impl SourceError {
    /// Creates an unreachable-source error.
    #[must_use]
    pub fn unreachable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed-source error.
    #[must_use]
    pub fn malformed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by dataset construction and access.
#[derive(Debug, Clone, Error)]
pub enum DatasetError {
    /// A column's row count disagrees with the rest of the dataset.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// The offending column.
        column: String,
        /// The expected row count.
        expected: usize,
        /// The actual row count.
        actual: usize,
    },

    /// A referenced column does not exist.
    #[error("unknown column '{column}'")]
    UnknownColumn {
        /// The missing column name.
        column: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::source_unavailable("data.csv", "gone").is_fatal());
        assert!(PipelineError::StoreUnavailable("disk full".into()).is_fatal());
        assert!(!PipelineError::stage("train", "bad shape").is_fatal());
        assert!(!PipelineError::Serialization("oops".into()).is_fatal());
    }

    #[test]
    fn test_cycle_error_renders_path() {
        let err = GraphValidationError::cycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.stages.len(), 3);
    }

    #[test]
    fn test_undeclared_output_message() {
        let err = GraphValidationError::undeclared_output("train", "preprocess", "train_dataset");
        assert!(err.to_string().contains("train_dataset"));
        assert!(err.to_string().contains("preprocess"));
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::unreachable("s3://bucket/raw", "timeout");
        assert!(err.to_string().contains("s3://bucket/raw"));
        assert!(err.to_string().contains("unreachable"));
    }
}
