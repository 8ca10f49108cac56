//! Sequential DAG orchestration.
//!
//! Stages run strictly in topological order within one run; later stages
//! consume artifacts produced by earlier ones. The external scheduler may
//! run many *runs* concurrently; run isolation comes from the store's
//! `run_id` namespacing, so the orchestrator itself needs no locking.

use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::persist::ReportStore;
use crate::stages::StageContext;
use crate::store::{Artifact, ArtifactStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::executor::{SequentialExecutor, StageExecutor};
use super::fallback::FallbackProducer;
use super::graph::StageGraph;
use super::result::{RunOutcome, RunState, StageResult, StageStatus};
use super::spec::StageSpec;

/// Drives a stage graph through one run.
///
/// Retry policy belongs to the external scheduler: a failed stage is
/// recorded, downstream stages are skipped, declared `always_run` stages
/// still execute, and the run ends `Failed`. Only source and store
/// unavailability abort the run outright.
pub struct StageOrchestrator {
    store: Arc<dyn ArtifactStore>,
    fallback: Arc<dyn FallbackProducer>,
    executor: Arc<dyn StageExecutor>,
    events: Arc<dyn EventSink>,
    report_store: Option<Arc<ReportStore>>,
}

impl StageOrchestrator {
    /// Creates an orchestrator with the default sequential executor.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>, fallback: Arc<dyn FallbackProducer>) -> Self {
        Self {
            store,
            fallback,
            executor: Arc::new(SequentialExecutor),
            events: Arc::new(NoOpEventSink),
            report_store: None,
        }
    }

    /// Swaps the executor strategy.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Attaches an event sink for run/stage lifecycle events.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Persists one stage-result summary per stage per run.
    #[must_use]
    pub fn with_report_store(mut self, reports: Arc<ReportStore>) -> Self {
        self.report_store = Some(reports);
        self
    }

    /// Executes the graph for one run.
    ///
    /// # Errors
    ///
    /// Only the fatal conditions return `Err`:
    /// [`PipelineError::SourceUnavailable`] (fallback could not reach the
    /// original source) and [`PipelineError::StoreUnavailable`]. Stage
    /// failures are reported inside the `Ok(RunOutcome)`.
    pub async fn execute(
        &self,
        run_id: &str,
        graph: &StageGraph,
        source_ref: &str,
    ) -> Result<RunOutcome, PipelineError> {
        info!(run_id, pipeline = graph.name(), stages = graph.stage_count(), "run started");
        self.events.try_emit(
            "run.started",
            Some(serde_json::json!({"run_id": run_id, "pipeline": graph.name()})),
        );

        let mut results: Vec<StageResult> = Vec::new();
        let mut first_failure: Option<String> = None;

        for stage_name in graph.execution_order() {
            let Some(spec) = graph.stage(stage_name) else {
                continue;
            };

            if first_failure.is_some() && !spec.always_run {
                let reason = "upstream failure";
                self.events.try_emit(
                    "stage.skipped",
                    Some(serde_json::json!({"stage": stage_name, "reason": reason})),
                );
                let skipped = StageResult::skipped(stage_name, chrono::Utc::now(), reason);
                self.persist_summary(run_id, &skipped);
                results.push(skipped);
                continue;
            }

            let inputs = self.resolve_inputs(run_id, spec, source_ref).await?;
            let ctx = StageContext::new(run_id, stage_name, source_ref, inputs);

            self.events.try_emit(
                "stage.started",
                Some(serde_json::json!({"stage": stage_name})),
            );
            let result = self.executor.run_stage(spec.runner.as_ref(), &ctx).await;

            match result.status {
                StageStatus::Ok => {
                    for (key, value) in &result.outputs {
                        self.store.put(run_id, stage_name, key, value.clone())?;
                    }
                    self.events.try_emit(
                        "stage.completed",
                        Some(serde_json::json!({
                            "stage": stage_name,
                            "duration_ms": result.duration_ms(),
                        })),
                    );
                }
                StageStatus::Failed => {
                    error!(run_id, stage = %stage_name, error = ?result.error, "stage failed");
                    self.events.try_emit(
                        "stage.failed",
                        Some(serde_json::json!({
                            "stage": stage_name,
                            "error": result.error,
                        })),
                    );
                    // Cleanup failures degrade to diagnostics; they never
                    // fail an otherwise completed run.
                    if !spec.always_run && first_failure.is_none() {
                        first_failure = Some(format!(
                            "stage '{}' failed: {}",
                            stage_name,
                            result.error.clone().unwrap_or_default()
                        ));
                    }
                }
                StageStatus::Skipped => {
                    self.events.try_emit(
                        "stage.skipped",
                        Some(serde_json::json!({"stage": stage_name})),
                    );
                }
            }

            self.persist_summary(run_id, &result);
            results.push(result);
        }

        let outcome = if let Some(error) = first_failure {
            self.events.try_emit(
                "run.failed",
                Some(serde_json::json!({"run_id": run_id, "error": error})),
            );
            warn!(run_id, error = %error, "run failed");
            RunOutcome {
                run_id: run_id.to_string(),
                state: RunState::Failed,
                stage_results: results,
                error: Some(error),
            }
        } else {
            self.events.try_emit(
                "run.completed",
                Some(serde_json::json!({"run_id": run_id})),
            );
            info!(run_id, "run completed");
            RunOutcome {
                run_id: run_id.to_string(),
                state: RunState::Completed,
                stage_results: results,
                error: None,
            }
        };
        Ok(outcome)
    }

    /// Resolves a stage's declared inputs, invoking the fallback producer
    /// for every missing artifact.
    ///
    /// A rebuilt artifact is written back to the store so later consumers
    /// of the same key see one consistent value.
    async fn resolve_inputs(
        &self,
        run_id: &str,
        spec: &StageSpec,
        source_ref: &str,
    ) -> Result<HashMap<String, Artifact>, PipelineError> {
        let mut inputs = HashMap::new();
        for binding in &spec.inputs {
            let artifact = match self.store.get(run_id, &binding.producer, &binding.key)? {
                Some(artifact) => artifact,
                None => {
                    warn!(
                        run_id,
                        stage = %spec.name,
                        producer = %binding.producer,
                        key = %binding.key,
                        "artifact missing; invoking fallback recomputation"
                    );
                    self.events.try_emit(
                        "fallback.invoked",
                        Some(serde_json::json!({
                            "stage": spec.name,
                            "producer": binding.producer,
                            "key": binding.key,
                        })),
                    );
                    let rebuilt = self
                        .fallback
                        .rebuild(run_id, &binding.producer, &binding.key, source_ref)
                        .await?;
                    self.store
                        .put(run_id, &binding.producer, &binding.key, rebuilt.value)?
                }
            };
            inputs.insert(binding.alias.clone(), artifact);
        }
        Ok(inputs)
    }

    fn persist_summary(&self, run_id: &str, result: &StageResult) {
        if let Some(reports) = &self.report_store {
            if let Err(e) = reports.save_stage_result(run_id, result) {
                warn!(run_id, stage = %result.stage, error = %e, "failed to persist stage summary");
            }
        }
    }
}

impl std::fmt::Debug for StageOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageOrchestrator")
            .field("persists_summaries", &self.report_store.is_some())
            .finish()
    }
}
