//! Pipeline orchestration: graph, results, executor strategy, fallback.

mod executor;
mod fallback;
mod graph;
mod orchestrator;
mod result;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use executor::{SequentialExecutor, StageExecutor, TimeoutExecutor};
pub use fallback::{Derivation, FallbackProducer, SourceFallbackProducer};
pub use graph::{StageGraph, StageGraphBuilder};
pub use orchestrator::StageOrchestrator;
pub use result::{RunOutcome, RunState, StageResult, StageStatus};
pub use spec::{InputBinding, StageSpec};
