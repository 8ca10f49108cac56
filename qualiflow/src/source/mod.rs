//! Source loader boundary.
//!
//! The loader is an external collaborator: it must be idempotent and
//! side-effect-free so the fallback producer can call it repeatedly to
//! re-derive lost artifacts.

use crate::dataset::Dataset;
use crate::errors::SourceError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Loads the original dataset behind a source reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Loads the dataset addressed by `source_ref`.
    ///
    /// Repeated calls with the same reference must return equivalent data.
    async fn load(&self, source_ref: &str) -> Result<Dataset, SourceError>;
}

/// An in-memory source loader for tests and single-process demos.
///
/// Datasets are registered per reference; loading clones, so the
/// registered copy is never mutated by callers.
#[derive(Debug, Default)]
pub struct MemorySourceLoader {
    sources: RwLock<HashMap<String, Dataset>>,
}

impl MemorySourceLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dataset under a reference.
    #[must_use]
    pub fn with_source(self, source_ref: impl Into<String>, dataset: Dataset) -> Self {
        self.sources.write().insert(source_ref.into(), dataset);
        self
    }

    /// Registers a dataset under a reference on an existing loader.
    pub fn register(&self, source_ref: impl Into<String>, dataset: Dataset) {
        self.sources.write().insert(source_ref.into(), dataset);
    }

    /// Removes a reference, simulating a source that became unreachable.
    pub fn remove(&self, source_ref: &str) {
        self.sources.write().remove(source_ref);
    }
}

#[async_trait]
impl SourceLoader for MemorySourceLoader {
    async fn load(&self, source_ref: &str) -> Result<Dataset, SourceError> {
        self.sources
            .read()
            .get(source_ref)
            .cloned()
            .ok_or_else(|| SourceError::unreachable(source_ref, "no such source registered"))
    }
}
