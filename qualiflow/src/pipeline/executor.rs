//! Executor strategy for running a single stage.
//!
//! The orchestrator depends on this abstraction instead of a concrete
//! execution mechanism; swapping strategies is a constructor parameter,
//! never a patch of scheduler internals.

use crate::pipeline::StageResult;
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Runs one stage to completion and returns its result envelope.
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Executes the stage within the given context.
    async fn run_stage(&self, stage: &dyn Stage, ctx: &StageContext) -> StageResult;
}

/// The default executor: awaits the stage inline on the current task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

#[async_trait]
impl StageExecutor for SequentialExecutor {
    async fn run_stage(&self, stage: &dyn Stage, ctx: &StageContext) -> StageResult {
        stage.execute(ctx).await
    }
}

/// Decorator that bounds each stage's wall-clock time.
///
/// A stage that overruns is reported as `Failed`, not aborted mid-run;
/// the orchestrator's usual failure path (cleanup included) applies.
#[derive(Debug, Clone)]
pub struct TimeoutExecutor {
    inner: Arc<dyn StageExecutor>,
    timeout: Duration,
}

impl TimeoutExecutor {
    /// Wraps an executor with a per-stage timeout.
    #[must_use]
    pub fn new(inner: Arc<dyn StageExecutor>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl StageExecutor for TimeoutExecutor {
    async fn run_stage(&self, stage: &dyn Stage, ctx: &StageContext) -> StageResult {
        let started = chrono::Utc::now();
        match tokio::time::timeout(self.timeout, self.inner.run_stage(stage, ctx)).await {
            Ok(result) => result,
            Err(_) => StageResult::failed(
                ctx.stage_id(),
                started,
                format!("stage timed out after {:?}", self.timeout),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;
    use std::collections::HashMap;

    fn ctx(stage: &str) -> StageContext {
        StageContext::new("run-1", stage, "src", HashMap::new())
    }

    #[derive(Debug)]
    struct SlowStage;

    #[async_trait]
    impl Stage for SlowStage {
        fn name(&self) -> &str {
            "slow"
        }

        async fn execute(&self, ctx: &StageContext) -> StageResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StageResult::ok_empty(ctx.stage_id(), chrono::Utc::now())
        }
    }

    #[tokio::test]
    async fn test_sequential_executor_runs_stage() {
        let executor = SequentialExecutor;
        let stage = NoOpStage::new("noop");
        let result = executor.run_stage(&stage, &ctx("noop")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_executor_passes_fast_stage() {
        let executor =
            TimeoutExecutor::new(Arc::new(SequentialExecutor), Duration::from_secs(1));
        let stage = NoOpStage::new("noop");
        let result = executor.run_stage(&stage, &ctx("noop")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_executor_fails_slow_stage() {
        let executor =
            TimeoutExecutor::new(Arc::new(SequentialExecutor), Duration::from_millis(50));
        let result = executor.run_stage(&SlowStage, &ctx("slow")).await;
        assert!(result.is_failed());
        assert!(result.error.as_deref().unwrap_or_default().contains("timed out"));
    }
}
