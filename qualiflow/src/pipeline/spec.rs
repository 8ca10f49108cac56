//! Stage specifications: the declared contract of one graph node.

use crate::errors::GraphValidationError;
use crate::stages::Stage;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Binds a stage's local input alias to an upstream `(producer, key)`
/// artifact address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    /// The alias under which the stage sees the artifact.
    pub alias: String,
    /// The upstream stage that produces the artifact.
    pub producer: String,
    /// The output key under the producer's namespace.
    pub key: String,
}

/// Specification for a single stage in a pipeline graph.
///
/// Producers and consumers are statically known from the declared inputs
/// and outputs; nothing is discovered via string keys at runtime.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Names of stages this stage depends on (input producers are added
    /// automatically at graph construction).
    pub dependencies: BTreeSet<String>,
    /// Declared required inputs.
    pub inputs: Vec<InputBinding>,
    /// Declared produced output keys.
    pub outputs: Vec<String>,
    /// Run this stage once all predecessors are terminal, regardless of
    /// their outcome (trigger-rule semantics for cleanup stages).
    pub always_run: bool,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
            dependencies: BTreeSet::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            always_run: false,
        }
    }

    /// Adds an explicit ordering dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Declares a required input resolved from `producer`'s output `key`.
    #[must_use]
    pub fn with_input(
        mut self,
        alias: impl Into<String>,
        producer: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.inputs.push(InputBinding {
            alias: alias.into(),
            producer: producer.into(),
            key: key.into(),
        });
        self
    }

    /// Declares a produced output key.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>) -> Self {
        self.outputs.push(key.into());
        self
    }

    /// Marks the stage to run unconditionally once all predecessors have
    /// reached a terminal state.
    #[must_use]
    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }

    /// Validates the spec in isolation.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        if self.dependencies.contains(&self.name) {
            return Err(GraphValidationError::new(format!(
                "stage '{}' cannot depend on itself",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        if self.inputs.iter().any(|b| b.producer == self.name) {
            return Err(GraphValidationError::new(format!(
                "stage '{}' cannot consume its own outputs",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}
