//! Stage trait and execution context.
//!
//! Stages are the units of work an external scheduler runs independently.
//! A stage sees only its [`StageContext`] (resolved input artifacts plus
//! run addressing) and returns a [`StageResult`]; it never touches the
//! store or other stages directly.

mod builtin;

pub use builtin::{CleanupStage, LoadStage, PreprocessStage, QualityCheckStage};

use crate::dataset::Dataset;
use crate::errors::PipelineError;
use crate::pipeline::StageResult;
use crate::store::Artifact;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// Everything a stage may read during one execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: String,
    stage_id: String,
    source_ref: String,
    inputs: HashMap<String, Artifact>,
}

impl StageContext {
    /// Creates a context for one stage execution.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        stage_id: impl Into<String>,
        source_ref: impl Into<String>,
        inputs: HashMap<String, Artifact>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            stage_id: stage_id.into(),
            source_ref: source_ref.into(),
            inputs,
        }
    }

    /// The run this execution belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The executing stage's identifier.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// The run's original source reference.
    #[must_use]
    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    /// Looks up a resolved input artifact by its declared alias.
    #[must_use]
    pub fn input(&self, alias: &str) -> Option<&Artifact> {
        self.inputs.get(alias)
    }

    /// Returns an input artifact or a stage-execution error naming it.
    pub fn require_input(&self, alias: &str) -> Result<&Artifact, PipelineError> {
        self.inputs.get(alias).ok_or_else(|| {
            PipelineError::stage(&self.stage_id, format!("missing resolved input '{alias}'"))
        })
    }

    /// Decodes an input artifact as a [`Dataset`].
    pub fn dataset_input(&self, alias: &str) -> Result<Dataset, PipelineError> {
        self.require_input(alias)?.decode()
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// Stages do not raise: failures are reported through a
    /// [`StageResult`] with `Failed` status so the orchestrator can keep
    /// a full audit trail and still run cleanup.
    async fn execute(&self, ctx: &StageContext) -> StageResult;
}

/// A function-based stage, handy for tests and external transforms.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        (self.func)(ctx)
    }
}

/// A no-op stage for wiring tests.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> StageResult {
        StageResult::ok_empty(ctx.stage_id(), chrono::Utc::now())
    }
}
