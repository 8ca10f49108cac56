//! The stage dependency graph.
//!
//! A fixed DAG of stage identifiers with declared inputs and outputs.
//! All structural problems (cycles, unknown dependencies, inputs without
//! a declared producer) are construction-time errors; execution can
//! assume a well-formed graph.

use crate::errors::GraphValidationError;
use std::collections::{HashMap, HashSet};

use super::spec::StageSpec;

/// A validated, topologically ordered stage graph.
#[derive(Debug, Clone)]
pub struct StageGraph {
    name: String,
    stages: HashMap<String, StageSpec>,
    execution_order: Vec<String>,
}

impl StageGraph {
    /// Starts building a graph.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> StageGraphBuilder {
        StageGraphBuilder {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Looks up a stage spec by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.get(name)
    }

    /// Returns the deterministic topological execution order.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }
}

/// Builder that validates the graph before handing out a [`StageGraph`].
#[derive(Debug)]
pub struct StageGraphBuilder {
    name: String,
    stages: Vec<StageSpec>,
}

impl StageGraphBuilder {
    /// Adds a stage.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Validates and finalizes the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphValidationError`] for duplicate stages, unknown
    /// dependencies, inputs without a declared producer output, or cycles.
    pub fn build(self) -> Result<StageGraph, GraphValidationError> {
        if self.stages.is_empty() {
            return Err(GraphValidationError::new("graph has no stages"));
        }

        let insertion_order: Vec<String> = self.stages.iter().map(|s| s.name.clone()).collect();
        let mut stages: HashMap<String, StageSpec> = HashMap::new();
        for spec in self.stages {
            spec.validate()?;
            let name = spec.name.clone();
            if stages.insert(name.clone(), spec).is_some() {
                return Err(GraphValidationError::duplicate_stage(&name));
            }
        }

        // Input producers become ordering dependencies automatically.
        let names: HashSet<String> = stages.keys().cloned().collect();
        for name in &insertion_order {
            let spec = match stages.get(name) {
                Some(s) => s.clone(),
                None => continue,
            };
            for binding in &spec.inputs {
                let producer = match stages.get(&binding.producer) {
                    Some(p) => p,
                    None => {
                        return Err(GraphValidationError::unknown_producer(
                            name,
                            &binding.producer,
                            &binding.key,
                        ))
                    }
                };
                if !producer.outputs.contains(&binding.key) {
                    return Err(GraphValidationError::undeclared_output(
                        name,
                        &binding.producer,
                        &binding.key,
                    ));
                }
                if let Some(entry) = stages.get_mut(name) {
                    entry.dependencies.insert(binding.producer.clone());
                }
            }
            for dep in &spec.dependencies {
                if !names.contains(dep) {
                    return Err(GraphValidationError::unknown_dependency(name, dep));
                }
            }
        }

        let execution_order = topological_order(&stages, &insertion_order)?;
        Ok(StageGraph {
            name: self.name,
            stages,
            execution_order,
        })
    }
}

/// Depth-first topological sort with cycle detection.
///
/// Visits stages in insertion order for determinism; reports the cycle
/// path when one exists.
fn topological_order(
    stages: &HashMap<String, StageSpec>,
    insertion_order: &[String],
) -> Result<Vec<String>, GraphValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: &str,
        stages: &HashMap<String, StageSpec>,
        marks: &mut HashMap<String, Mark>,
        path: &mut Vec<String>,
        result: &mut Vec<String>,
    ) -> Result<(), GraphValidationError> {
        match marks.get(node).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].to_vec();
                cycle.push(node.to_string());
                return Err(GraphValidationError::cycle(cycle));
            }
            Mark::Unvisited => {}
        }

        marks.insert(node.to_string(), Mark::InProgress);
        path.push(node.to_string());
        if let Some(spec) = stages.get(node) {
            for dep in &spec.dependencies {
                visit(dep, stages, marks, path, result)?;
            }
        }
        path.pop();
        marks.insert(node.to_string(), Mark::Done);
        result.push(node.to_string());
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    let mut result = Vec::new();
    for name in insertion_order {
        visit(name, stages, &mut marks, &mut path, &mut result)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{NoOpStage, Stage};
    use std::sync::Arc;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(NoOpStage::new(name))
    }

    fn linear_graph() -> StageGraph {
        StageGraph::builder("test")
            .stage(StageSpec::new("a", noop("a")).with_output("x"))
            .stage(
                StageSpec::new("b", noop("b"))
                    .with_input("x", "a", "x")
                    .with_output("y"),
            )
            .stage(StageSpec::new("c", noop("c")).with_input("y", "b", "y"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_linear_order() {
        let graph = linear_graph();
        assert_eq!(graph.stage_count(), 3);
        assert_eq!(graph.execution_order(), ["a", "b", "c"]);
    }

    #[test]
    fn test_input_producer_becomes_dependency() {
        let graph = linear_graph();
        assert!(graph.stage("b").unwrap().dependencies.contains("a"));
        assert!(graph.stage("c").unwrap().dependencies.contains("b"));
    }

    #[test]
    fn test_cycle_is_construction_error() {
        let err = StageGraph::builder("cyclic")
            .stage(StageSpec::new("a", noop("a")).with_dependency("b"))
            .stage(StageSpec::new("b", noop("b")).with_dependency("a"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert!(err.stages.len() >= 2);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = StageGraph::builder("bad")
            .stage(StageSpec::new("a", noop("a")).with_dependency("ghost"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_unknown_producer_rejected() {
        let err = StageGraph::builder("bad")
            .stage(StageSpec::new("a", noop("a")).with_input("x", "ghost", "x"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_undeclared_output_rejected() {
        let err = StageGraph::builder("bad")
            .stage(StageSpec::new("a", noop("a")).with_output("x"))
            .stage(StageSpec::new("b", noop("b")).with_input("y", "a", "y"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("does not declare"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = StageGraph::builder("bad")
            .stage(StageSpec::new("a", noop("a")))
            .stage(StageSpec::new("a", noop("a")))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert!(StageGraph::builder("empty").build().is_err());
    }

    #[test]
    fn test_diamond_order_is_deterministic() {
        let build = || {
            StageGraph::builder("diamond")
                .stage(StageSpec::new("root", noop("root")).with_output("r"))
                .stage(
                    StageSpec::new("left", noop("left"))
                        .with_input("r", "root", "r")
                        .with_output("l"),
                )
                .stage(
                    StageSpec::new("right", noop("right"))
                        .with_input("r", "root", "r")
                        .with_output("x"),
                )
                .stage(
                    StageSpec::new("join", noop("join"))
                        .with_input("l", "left", "l")
                        .with_input("x", "right", "x"),
                )
                .build()
                .unwrap()
        };
        let first = build().execution_order().to_vec();
        let second = build().execution_order().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.first().map(String::as_str), Some("root"));
        assert_eq!(first.last().map(String::as_str), Some("join"));
    }
}
