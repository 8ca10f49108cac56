//! Filesystem-backed artifact store.
//!
//! One JSON document per artifact at `{root}/{run_id}/{stage_id}/{key}.json`.
//! Key components are opaque strings from the stage graph; they are expected
//! to be simple identifiers, not paths.

use super::{Artifact, ArtifactKey, ArtifactStore};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink, ARTIFACT_OVERRIDDEN};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A durable artifact store rooted at a directory.
pub struct JsonFileStore {
    root: PathBuf,
    events: Arc<dyn EventSink>,
}

impl JsonFileStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| PipelineError::StoreUnavailable(format!("{}: {e}", root.display())))?;
        Ok(Self {
            root,
            events: Arc::new(NoOpEventSink),
        })
    }

    /// Attaches an event sink for override diagnostics.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, run_id: &str, stage_id: &str, key: &str) -> PathBuf {
        self.root
            .join(run_id)
            .join(stage_id)
            .join(format!("{key}.json"))
    }

    fn unavailable(context: &Path, err: &std::io::Error) -> PipelineError {
        PipelineError::StoreUnavailable(format!("{}: {err}", context.display()))
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("root", &self.root)
            .finish()
    }
}

impl ArtifactStore for JsonFileStore {
    fn put(
        &self,
        run_id: &str,
        stage_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Artifact, PipelineError> {
        let path = self.artifact_path(run_id, stage_id, key);
        let overridden = path.exists();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::unavailable(parent, &e))?;
        }

        let artifact = Artifact::new(ArtifactKey::new(run_id, stage_id, key), value);
        let body = serde_json::to_string_pretty(&artifact)?;
        fs::write(&path, body).map_err(|e| Self::unavailable(&path, &e))?;

        if overridden {
            self.events.try_emit(
                ARTIFACT_OVERRIDDEN,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "stage_id": stage_id,
                    "key": key,
                    "path": path.display().to_string(),
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
        let path = self.artifact_path(run_id, stage_id, key);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::unavailable(&path, &e)),
        };
        let artifact: Artifact = serde_json::from_str(&body)?;
        Ok(Some(artifact))
    }

    fn exists(&self, run_id: &str, stage_id: &str, key: &str) -> Result<bool, PipelineError> {
        Ok(self.artifact_path(run_id, stage_id, key).exists())
    }

    fn keys_for_run(&self, run_id: &str) -> Result<Vec<ArtifactKey>, PipelineError> {
        let run_dir = self.root.join(run_id);
        let mut keys = Vec::new();
        let stages = match fs::read_dir(&run_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(Self::unavailable(&run_dir, &e)),
        };
        for stage in stages {
            let stage = stage.map_err(|e| Self::unavailable(&run_dir, &e))?;
            let stage_id = stage.file_name().to_string_lossy().to_string();
            let entries =
                fs::read_dir(stage.path()).map_err(|e| Self::unavailable(&run_dir, &e))?;
            for entry in entries {
                let entry = entry.map_err(|e| Self::unavailable(&run_dir, &e))?;
                let name = entry.file_name().to_string_lossy().to_string();
                if let Some(key) = name.strip_suffix(".json") {
                    keys.push(ArtifactKey::new(run_id, stage_id.clone(), key));
                }
            }
        }
        keys.sort_by(|a, b| (&a.stage_id, &a.key).cmp(&(&b.stage_id, &b.key)));
        Ok(keys)
    }

    fn delete_run(&self, run_id: &str) -> Result<usize, PipelineError> {
        let count = self.keys_for_run(run_id)?.len();
        let run_dir = self.root.join(run_id);
        match fs::remove_dir_all(&run_dir) {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Self::unavailable(&run_dir, &e)),
        }
    }
}
