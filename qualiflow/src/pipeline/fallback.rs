//! Fallback recomputation for lost artifacts.
//!
//! The external scheduler's messaging layer is at-most-once: results can
//! silently disappear between process restarts. The fallback producer is
//! the single concession to that: a pure recomputation path from the
//! original source, scoped to one missing artifact rather than the whole
//! run.

use crate::dataset::Dataset;
use crate::errors::PipelineError;
use crate::source::SourceLoader;
use crate::store::{Artifact, ArtifactKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Rebuilds a missing artifact from the original source.
#[async_trait]
pub trait FallbackProducer: Send + Sync {
    /// Re-derives the value the missing artifact would have held.
    ///
    /// The result must be equivalent to the lost artifact (downstream
    /// randomness is held constant by seeding), though not necessarily
    /// byte-identical.
    ///
    /// # Errors
    ///
    /// [`PipelineError::SourceUnavailable`] when even the original source
    /// cannot be reached; the orchestrator surfaces this as a run failure.
    async fn rebuild(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
        source_ref: &str,
    ) -> Result<Artifact, PipelineError>;
}

/// A pure derivation from the source dataset to one artifact value.
pub type Derivation =
    dyn Fn(&Dataset) -> Result<serde_json::Value, PipelineError> + Send + Sync;

/// Fallback producer that reloads the source and replays registered pure
/// derivations, keyed by `(stage_id, key)`.
pub struct SourceFallbackProducer {
    loader: Arc<dyn SourceLoader>,
    derivations: HashMap<(String, String), Arc<Derivation>>,
}

impl SourceFallbackProducer {
    /// Creates a producer backed by the given loader.
    #[must_use]
    pub fn new(loader: Arc<dyn SourceLoader>) -> Self {
        Self {
            loader,
            derivations: HashMap::new(),
        }
    }

    /// Registers a derivation for one `(stage_id, key)` address.
    #[must_use]
    pub fn with_derivation<F>(
        mut self,
        stage_id: impl Into<String>,
        key: impl Into<String>,
        derive: F,
    ) -> Self
    where
        F: Fn(&Dataset) -> Result<serde_json::Value, PipelineError> + Send + Sync + 'static,
    {
        self.derivations
            .insert((stage_id.into(), key.into()), Arc::new(derive));
        self
    }

    /// Registers an identity derivation: the artifact is the source
    /// dataset itself (a load stage's raw output).
    #[must_use]
    pub fn with_raw_passthrough(
        self,
        stage_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.with_derivation(stage_id, key, |ds| Ok(serde_json::to_value(ds)?))
    }
}

impl std::fmt::Debug for SourceFallbackProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFallbackProducer")
            .field("derivations", &self.derivations.len())
            .finish()
    }
}

#[async_trait]
impl FallbackProducer for SourceFallbackProducer {
    async fn rebuild(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
        source_ref: &str,
    ) -> Result<Artifact, PipelineError> {
        let derive = self
            .derivations
            .get(&(stage_id.to_string(), key.to_string()))
            .ok_or_else(|| {
                PipelineError::stage(
                    stage_id,
                    format!("no fallback derivation registered for output '{key}'"),
                )
            })?;

        info!(run_id, stage_id, key, source_ref, "rebuilding lost artifact from source");
        let dataset = self
            .loader
            .load(source_ref)
            .await
            .map_err(|e| PipelineError::source_unavailable(source_ref, e.to_string()))?;

        let value = derive(&dataset)?;
        Ok(Artifact::new(ArtifactKey::new(run_id, stage_id, key), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemorySourceLoader, MockSourceLoader};
    use crate::errors::SourceError;

    fn source() -> Dataset {
        Dataset::builder()
            .numeric_dense("x", vec![1.0, 2.0, 3.0])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_raw_passthrough_rebuild() {
        let loader = Arc::new(MemorySourceLoader::new().with_source("data/raw", source()));
        let producer =
            SourceFallbackProducer::new(loader).with_raw_passthrough("load", "raw_dataset");

        let artifact = producer
            .rebuild("run-1", "load", "raw_dataset", "data/raw")
            .await
            .unwrap();
        let rebuilt: Dataset = artifact.decode().unwrap();
        assert_eq!(rebuilt.data_hash(), source().data_hash());
        assert_eq!(artifact.key, ArtifactKey::new("run-1", "load", "raw_dataset"));
    }

    #[tokio::test]
    async fn test_registered_derivation_replays_transform() {
        let loader = Arc::new(MemorySourceLoader::new().with_source("data/raw", source()));
        let producer = SourceFallbackProducer::new(loader).with_derivation(
            "double",
            "doubled",
            |ds| {
                let values: Vec<f64> = ds
                    .column("x")
                    .and_then(|c| c.numeric_values())
                    .unwrap_or_default()
                    .iter()
                    .map(|v| v * 2.0)
                    .collect();
                Ok(serde_json::json!(values))
            },
        );

        let artifact = producer
            .rebuild("run-1", "double", "doubled", "data/raw")
            .await
            .unwrap();
        assert_eq!(artifact.value, serde_json::json!([2.0, 4.0, 6.0]));
    }

    #[tokio::test]
    async fn test_unreachable_source_is_fatal() {
        let mut mock = MockSourceLoader::new();
        mock.expect_load()
            .returning(|r| Err(SourceError::unreachable(r, "disk gone")));
        let producer = SourceFallbackProducer::new(Arc::new(mock))
            .with_raw_passthrough("load", "raw_dataset");

        let err = producer
            .rebuild("run-1", "load", "raw_dataset", "data/raw")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unregistered_key_is_stage_error_not_fatal() {
        let loader = Arc::new(MemorySourceLoader::new().with_source("data/raw", source()));
        let producer = SourceFallbackProducer::new(loader);

        let err = producer
            .rebuild("run-1", "train", "model", "data/raw")
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("model"));
    }
}
