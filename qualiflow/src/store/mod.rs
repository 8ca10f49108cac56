//! Per-run artifact store for inter-stage data handoff.
//!
//! Every value a stage publishes is addressed by `(run_id, stage_id, key)`.
//! Namespacing by `run_id` gives run isolation: two concurrent runs never
//! observe each other's artifacts, so no cross-run locking is needed.
//!
//! A missing key is not a failure: `get` returns `Ok(None)` so the
//! orchestrator can decide between fallback recomputation and failure.
//! Store *unavailability* (disk/backend down) is the hard error.

mod fs;
mod memory;

pub use fs::JsonFileStore;
pub use memory::MemoryStore;

use crate::errors::PipelineError;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies one published value within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// The run this artifact belongs to.
    pub run_id: String,
    /// The stage that published it.
    pub stage_id: String,
    /// The key within the stage's namespace.
    pub key: String,
}

impl ArtifactKey {
    /// Creates a new artifact key.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        stage_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            stage_id: stage_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.run_id, self.stage_id, self.key)
    }
}

/// A published value plus its addressing and write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The artifact's address.
    pub key: ArtifactKey,
    /// The stored value.
    pub value: serde_json::Value,
    /// When the artifact was written.
    pub written_at: Timestamp,
}

impl Artifact {
    /// Creates an artifact stamped with the current time.
    #[must_use]
    pub fn new(key: ArtifactKey, value: serde_json::Value) -> Self {
        Self {
            key,
            value,
            written_at: chrono::Utc::now(),
        }
    }

    /// Deserializes the value into a concrete type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, PipelineError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Key/value persistence for inter-stage handoff.
///
/// Reads and writes are synchronous with no internal retry; retry policy
/// belongs to the external scheduler wrapping whole stages. Retrieval
/// returns a deep copy, never a reference into the store.
pub trait ArtifactStore: Send + Sync {
    /// Publishes a value. Overwriting an existing key succeeds but emits
    /// an `artifact_overridden` event.
    fn put(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Artifact, PipelineError>;

    /// Retrieves a value. `Ok(None)` for a never-written key.
    fn get(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
    ) -> Result<Option<Artifact>, PipelineError>;

    /// Returns true if the key has been written.
    fn exists(&self, run_id: &str, stage_id: &str, key: &str) -> Result<bool, PipelineError>;

    /// Lists every key written under a run.
    fn keys_for_run(&self, run_id: &str) -> Result<Vec<ArtifactKey>, PipelineError>;

    /// Removes all artifacts of a run; returns how many were deleted.
    fn delete_run(&self, run_id: &str) -> Result<usize, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = ArtifactKey::new("run-1", "load", "raw_dataset");
        assert_eq!(key.to_string(), "run-1/load/raw_dataset");
    }

    #[test]
    fn test_artifact_decode() {
        let artifact = Artifact::new(
            ArtifactKey::new("r", "s", "k"),
            serde_json::json!({"rows": 42}),
        );
        let value: serde_json::Value = artifact.decode().unwrap();
        assert_eq!(value["rows"], 42);

        let bad: Result<Vec<String>, _> = artifact.decode();
        assert!(bad.is_err());
    }
}
