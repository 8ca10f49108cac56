//! In-memory artifact store backend.

use super::{Artifact, ArtifactKey, ArtifactStore};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, ARTIFACT_OVERRIDDEN};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A process-local artifact store.
///
/// The default backend for tests and single-process runs. All reads hand
/// out clones; writers never block each other across runs because keys
/// are namespaced by `run_id`.
pub struct MemoryStore {
    data: RwLock<HashMap<ArtifactKey, Artifact>>,
    events: Arc<dyn EventSink>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with no event sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Attaches an event sink for override diagnostics.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the total number of stored artifacts across all runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("artifacts", &self.len())
            .finish()
    }
}

impl ArtifactStore for MemoryStore {
    fn put(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Artifact, PipelineError> {
        let artifact_key = ArtifactKey::new(run_id, stage_id, key);
        let artifact = Artifact::new(artifact_key.clone(), value);

        let overridden = {
            let mut data = self.data.write();
            data.insert(artifact_key.clone(), artifact.clone()).is_some()
        };
        if overridden {
            self.events.try_emit(
                ARTIFACT_OVERRIDDEN,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "stage_id": stage_id,
                    "key": key,
                })),
            );
        }
        Ok(artifact)
    }

    fn get(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
    ) -> Result<Option<Artifact>, PipelineError> {
        let artifact_key = ArtifactKey::new(run_id, stage_id, key);
        Ok(self.data.read().get(&artifact_key).cloned())
    }

    fn exists(&self, run_id: &str, stage_id: &str, key: &str) -> Result<bool, PipelineError> {
        let artifact_key = ArtifactKey::new(run_id, stage_id, key);
        Ok(self.data.read().contains_key(&artifact_key))
    }

    fn keys_for_run(&self, run_id: &str) -> Result<Vec<ArtifactKey>, PipelineError> {
        let mut keys: Vec<ArtifactKey> = self
            .data
            .read()
            .keys()
            .filter(|k| k.run_id == run_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| (&a.stage_id, &a.key).cmp(&(&b.stage_id, &b.key)));
        Ok(keys)
    }

    fn delete_run(&self, run_id: &str) -> Result<usize, PipelineError> {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|k, _| k.run_id != run_id);
        Ok(before - data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;

    #[test]
    fn test_put_and_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("run-1", "load", "raw", serde_json::json!([1, 2, 3]))
            .unwrap();

        let artifact = store.get("run-1", "load", "raw").unwrap().unwrap();
        assert_eq!(artifact.value, serde_json::json!([1, 2, 3]));
        assert!(store.exists("run-1", "load", "raw").unwrap());
    }

    #[test]
    fn test_get_missing_key_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(store.get("run-1", "load", "never").unwrap().is_none());
        assert!(!store.exists("run-1", "load", "never").unwrap());
    }

    #[test]
    fn test_overwrite_emits_override_event() {
        let sink = Arc::new(CollectingEventSink::new());
        let store = MemoryStore::new().with_events(sink.clone());

        store.put("r", "s", "k", serde_json::json!(1)).unwrap();
        assert_eq!(sink.count(ARTIFACT_OVERRIDDEN), 0);

        store.put("r", "s", "k", serde_json::json!(2)).unwrap();
        assert_eq!(sink.count(ARTIFACT_OVERRIDDEN), 1);

        let artifact = store.get("r", "s", "k").unwrap().unwrap();
        assert_eq!(artifact.value, serde_json::json!(2));
    }

    #[test]
    fn test_run_isolation() {
        let store = MemoryStore::new();
        store.put("run-a", "s", "k", serde_json::json!("a")).unwrap();
        store.put("run-b", "s", "k", serde_json::json!("b")).unwrap();

        let a = store.get("run-a", "s", "k").unwrap().unwrap();
        let b = store.get("run-b", "s", "k").unwrap().unwrap();
        assert_eq!(a.value, serde_json::json!("a"));
        assert_eq!(b.value, serde_json::json!("b"));

        assert_eq!(store.delete_run("run-a").unwrap(), 1);
        assert!(store.get("run-a", "s", "k").unwrap().is_none());
        assert!(store.get("run-b", "s", "k").unwrap().is_some());
    }

    #[test]
    fn test_retrieval_returns_deep_copy() {
        let store = MemoryStore::new();
        store
            .put("r", "s", "k", serde_json::json!({"nested": [1]}))
            .unwrap();

        let mut first = store.get("r", "s", "k").unwrap().unwrap();
        first.value["nested"] = serde_json::json!([99]);

        let second = store.get("r", "s", "k").unwrap().unwrap();
        assert_eq!(second.value, serde_json::json!({"nested": [1]}));
    }

    #[test]
    fn test_keys_for_run_sorted() {
        let store = MemoryStore::new();
        store.put("r", "b", "y", serde_json::json!(0)).unwrap();
        store.put("r", "a", "z", serde_json::json!(0)).unwrap();
        store.put("r", "a", "x", serde_json::json!(0)).unwrap();

        let keys = store.keys_for_run("r").unwrap();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["r/a/x", "r/a/z", "r/b/y"]);
    }
}
