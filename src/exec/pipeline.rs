//! Pipeline files
//!
//! A pipeline is a JSON or YAML document wiring operation calls together:
//!
//! ```yaml
//! name: extract
//! inputs:
//!   lat: {type: float}
//!   method: {type: str, default: nearest}
//! steps:
//!   - id: ts
//!     op: timeseries
//!     inputs:
//!       lat: {source: lat}
//!       method: {source: method}
//! outputs:
//!   return: ts.return
//! ```
//!
//! A source is a pipeline input name, a step id, or `<step>.return`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;
use thiserror::Error;

use super::binding::coerce_value;
use crate::domain::{Monitor, Value};
use crate::ops::{Bindings, OpContext, OperationRegistry, ParamSpec, ParamType};

/// Name of the single output port every step exposes
pub const RETURN_PORT: &str = "return";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read workflow '{}': {cause}", .path.display())]
    Io { path: PathBuf, cause: std::io::Error },

    #[error("invalid workflow '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("workflow '{workflow}': {message}")]
    Invalid { workflow: String, message: String },

    #[error("workflow '{workflow}': steps form a cycle through '{step}'")]
    Cycle { workflow: String, step: String },

    #[error("step '{step}' uses unknown operation '{op}'")]
    UnknownOperation { step: String, op: String },

    #[error("step '{step}': {detail}")]
    StepInput { step: String, detail: String },

    #[error("step '{step}' failed: {error:#}")]
    StepFailed { step: String, error: anyhow::Error },
}

// ============================================================================
// File model
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineFile {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    inputs: BTreeMap<String, InputDecl>,
    #[serde(default)]
    steps: Vec<StepDecl>,
    #[serde(default)]
    outputs: BTreeMap<String, String>,
}

/// A declared pipeline input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDecl {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDecl {
    id: String,
    op: String,
    #[serde(default)]
    inputs: BTreeMap<String, StepInput>,
}

/// Where a step input takes its value from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StepInput {
    Source { source: String },
    Value { value: serde_json::Value },
}

// ============================================================================
// Resolved model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Input(usize),
    Step(usize),
}

#[derive(Debug, Clone)]
enum Binding {
    From(Source),
    Constant(Value),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub op: String,
    bindings: Vec<(String, Binding)>,
}

impl Step {
    fn dependencies(&self) -> impl Iterator<Item = usize> + '_ {
        self.bindings.iter().filter_map(|(_, b)| match b {
            Binding::From(Source::Step(i)) => Some(*i),
            _ => None,
        })
    }
}

/// A validated pipeline ready to run
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub description: String,
    inputs: Vec<(String, InputDecl)>,
    steps: Vec<Step>,
    order: Vec<usize>,
    outputs: Vec<(String, Source)>,
}

enum Syntax {
    Json,
    Yaml,
}

impl Syntax {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Syntax::Yaml
            }
            _ => Syntax::Json,
        }
    }
}

impl Pipeline {
    /// Loads and validates a pipeline file; YAML is used for `.yaml`/`.yml`
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|cause| PipelineError::Io {
            path: path.to_path_buf(),
            cause,
        })?;
        let parse_err = |message: String| PipelineError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let file: PipelineFile = match Syntax::for_path(path) {
            Syntax::Yaml => serde_yaml::from_str(&text).map_err(|e| parse_err(e.to_string()))?,
            Syntax::Json => serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))?,
        };
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::build(file, fallback)
    }

    /// Parses a pipeline from JSON text
    pub fn from_json(text: &str, name: &str) -> Result<Self, PipelineError> {
        let file: PipelineFile = serde_json::from_str(text).map_err(|e| PipelineError::Parse {
            path: PathBuf::from(name),
            message: e.to_string(),
        })?;
        Self::build(file, name.to_string())
    }

    fn build(file: PipelineFile, fallback_name: String) -> Result<Self, PipelineError> {
        let name = file.name.unwrap_or(fallback_name);
        let invalid = |message: String| PipelineError::Invalid {
            workflow: name.clone(),
            message,
        };

        let inputs: Vec<(String, InputDecl)> = file.inputs.into_iter().collect();
        let step_ids: Vec<String> = file.steps.iter().map(|s| s.id.clone()).collect();

        for (i, id) in step_ids.iter().enumerate() {
            if id.is_empty() || id.contains('.') {
                return Err(invalid(format!("invalid step id '{}'", id)));
            }
            if step_ids[..i].contains(id) {
                return Err(invalid(format!("duplicate step id '{}'", id)));
            }
        }

        let resolve = |reference: &str| -> Result<Source, PipelineError> {
            let found = match reference.split_once('.') {
                Some((step, port)) => {
                    if port != RETURN_PORT {
                        return Err(invalid(format!(
                            "step '{}' has no output '{}'",
                            step, port
                        )));
                    }
                    step_ids.iter().position(|id| id == step).map(Source::Step)
                }
                None => inputs
                    .iter()
                    .position(|(n, _)| n == reference)
                    .map(Source::Input)
                    .or_else(|| step_ids.iter().position(|id| id == reference).map(Source::Step)),
            };
            found.ok_or_else(|| invalid(format!("unknown source '{}'", reference)))
        };

        let mut steps = Vec::with_capacity(file.steps.len());
        for decl in file.steps {
            let mut bindings = Vec::with_capacity(decl.inputs.len());
            for (param, input) in decl.inputs {
                let binding = match input {
                    StepInput::Source { source } => Binding::From(resolve(&source)?),
                    StepInput::Value { value } => Binding::Constant(Value::from(value)),
                };
                bindings.push((param, binding));
            }
            steps.push(Step {
                id: decl.id,
                op: decl.op,
                bindings,
            });
        }

        let outputs = file
            .outputs
            .iter()
            .map(|(out, source)| Ok((out.clone(), resolve(source)?)))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let order = execution_order(&name, &steps)?;

        Ok(Self {
            name,
            description: file.description,
            inputs,
            steps,
            order,
            outputs,
        })
    }

    /// Declared inputs as operation-style parameters
    pub fn params(&self) -> Vec<ParamSpec> {
        self.inputs
            .iter()
            .map(|(name, decl)| ParamSpec {
                name: name.clone(),
                param_type: decl.param_type,
                default: decl.default.clone().map(|raw| {
                    let value = Value::from(raw);
                    coerce_value(name, value.clone(), decl.param_type).unwrap_or(value)
                }),
                description: decl.description.clone(),
            })
            .collect()
    }

    /// Steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.order.iter().map(move |&i| &self.steps[i])
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(n, _)| n.as_str())
    }

    /// Runs every step once and collects the declared outputs
    pub fn run(
        &self,
        inputs: &Bindings,
        ops: &OperationRegistry,
        ctx: &OpContext<'_>,
        monitor: &mut dyn Monitor,
    ) -> Result<Bindings, PipelineError> {
        let mut results: HashMap<usize, Value> = HashMap::new();

        let fetch = |source: Source, results: &HashMap<usize, Value>| -> Value {
            match source {
                Source::Input(i) => inputs.get(&self.inputs[i].0).cloned().unwrap_or(Value::Null),
                Source::Step(i) => results.get(&i).cloned().unwrap_or(Value::Null),
            }
        };

        for &index in &self.order {
            let step = &self.steps[index];
            let op = ops
                .lookup(&step.op)
                .ok_or_else(|| PipelineError::UnknownOperation {
                    step: step.id.clone(),
                    op: step.op.clone(),
                })?;
            let step_err = |detail: String| PipelineError::StepInput {
                step: step.id.clone(),
                detail,
            };

            if let Some((unknown, _)) = step
                .bindings
                .iter()
                .find(|(name, _)| op.param_spec(name).is_none())
            {
                return Err(step_err(format!(
                    "operation '{}' has no input named '{}'",
                    op.qualified_name, unknown
                )));
            }

            let mut args = Bindings::new();
            for param in &op.params {
                let supplied = step.bindings.iter().find(|(n, _)| *n == param.name);
                let value = match (supplied, &param.default) {
                    (Some((_, Binding::From(source))), _) => fetch(*source, &results),
                    (Some((_, Binding::Constant(value))), _) => value.clone(),
                    (None, Some(default)) => default.clone(),
                    (None, None) => {
                        return Err(step_err(format!("missing value for input '{}'", param.name)))
                    }
                };
                let value = coerce_value(&param.name, value, param.param_type)
                    .map_err(|e| step_err(e.to_string()))?;
                args.insert(param.name.clone(), value);
            }

            let value = op
                .call(&args, ctx, monitor)
                .map_err(|error| PipelineError::StepFailed {
                    step: step.id.clone(),
                    error,
                })?;
            results.insert(index, value);
        }

        Ok(self
            .outputs
            .iter()
            .map(|(name, source)| (name.clone(), fetch(*source, &results)))
            .collect())
    }
}

/// Orders steps so every step runs after the steps it reads from
fn execution_order(workflow: &str, steps: &[Step]) -> Result<Vec<usize>, PipelineError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..steps.len()).map(|i| graph.add_node(i)).collect();

    for (i, step) in steps.iter().enumerate() {
        for dep in step.dependencies() {
            graph.add_edge(nodes[dep], nodes[i], ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|idx| graph[idx]).collect()),
        Err(cycle) => Err(PipelineError::Cycle {
            workflow: workflow.to_string(),
            step: steps[graph[cycle.node_id()]].id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NullMonitor;
    use crate::ops::Operation;
    use crate::storage::FormatRegistry;
    use tempfile::TempDir;

    fn registry() -> OperationRegistry {
        let mut ops = OperationRegistry::new();
        ops.add(
            Operation::new("scale", |args, _ctx, _monitor| {
                let x = match args.get("x") {
                    Some(Value::Float(x)) => *x,
                    other => anyhow::bail!("bad x: {:?}", other),
                };
                let factor = match args.get("factor") {
                    Some(Value::Float(f)) => *f,
                    _ => 1.0,
                };
                Ok(Value::Float(x * factor))
            })
            .param(ParamSpec::required("x", ParamType::Float))
            .param(ParamSpec::optional("factor", ParamType::Float, 2.0)),
            false,
        )
        .unwrap();
        ops.add(
            Operation::new("fail", |_args, _ctx, _monitor| anyhow::bail!("exploded")),
            false,
        )
        .unwrap();
        ops
    }

    fn run(pipeline: &Pipeline, inputs: &[(&str, Value)]) -> Result<Bindings, PipelineError> {
        let formats = FormatRegistry::new();
        let ctx = OpContext { formats: &formats };
        let inputs: Bindings = inputs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        pipeline.run(&inputs, &registry(), &ctx, &mut NullMonitor)
    }

    const CHAIN: &str = r#"{
        "name": "chain",
        "inputs": {"x": {"type": "float"}},
        "steps": [
            {"id": "second", "op": "scale", "inputs": {"x": {"source": "first.return"}, "factor": {"value": 10}}},
            {"id": "first", "op": "scale", "inputs": {"x": {"source": "x"}}}
        ],
        "outputs": {"return": "second", "doubled": "first.return"}
    }"#;

    #[test]
    fn steps_run_in_dependency_order() {
        let pipeline = Pipeline::from_json(CHAIN, "chain").unwrap();
        let ids: Vec<&str> = pipeline.steps().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);

        let outputs = run(&pipeline, &[("x", Value::Float(1.5))]).unwrap();
        assert_eq!(outputs["doubled"], Value::Float(3.0));
        assert_eq!(outputs["return"], Value::Float(30.0));
    }

    #[test]
    fn inputs_become_params() {
        let pipeline = Pipeline::from_json(CHAIN, "chain").unwrap();
        let params = pipeline.params();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].param_type, ParamType::Float);
        assert!(params[0].is_required());
    }

    #[test]
    fn unknown_source_is_rejected() {
        let text = r#"{"steps": [{"id": "a", "op": "scale", "inputs": {"x": {"source": "nowhere"}}}]}"#;
        let err = Pipeline::from_json(text, "bad").unwrap_err();
        assert!(err.to_string().contains("unknown source 'nowhere'"));
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let text = r#"{"steps": [{"id": "a", "op": "scale"}, {"id": "a", "op": "scale"}]}"#;
        let err = Pipeline::from_json(text, "dup").unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'a'"));
    }

    #[test]
    fn cycles_are_rejected() {
        let text = r#"{"steps": [
            {"id": "a", "op": "scale", "inputs": {"x": {"source": "b"}}},
            {"id": "b", "op": "scale", "inputs": {"x": {"source": "a"}}}
        ]}"#;
        let err = Pipeline::from_json(text, "loop").unwrap_err();
        assert!(matches!(err, PipelineError::Cycle { .. }));
    }

    #[test]
    fn unknown_output_port_is_rejected() {
        let text = r#"{"steps": [{"id": "a", "op": "scale"}], "outputs": {"r": "a.value"}}"#;
        let err = Pipeline::from_json(text, "port").unwrap_err();
        assert!(err.to_string().contains("has no output 'value'"));
    }

    #[test]
    fn unknown_operation_fails_at_run() {
        let text = r#"{"steps": [{"id": "a", "op": "missing"}]}"#;
        let pipeline = Pipeline::from_json(text, "m").unwrap();
        let err = run(&pipeline, &[]).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownOperation { .. }));
    }

    #[test]
    fn step_failure_names_the_step() {
        let text = r#"{"steps": [{"id": "boom", "op": "fail"}]}"#;
        let pipeline = Pipeline::from_json(text, "f").unwrap();
        let err = run(&pipeline, &[]).unwrap_err();
        assert_eq!(err.to_string(), "step 'boom' failed: exploded");
    }

    #[test]
    fn missing_step_input_is_reported() {
        let text = r#"{"steps": [{"id": "a", "op": "scale"}]}"#;
        let pipeline = Pipeline::from_json(text, "m").unwrap();
        let err = run(&pipeline, &[]).unwrap_err();
        assert_eq!(err.to_string(), "step 'a': missing value for input 'x'");
    }

    #[test]
    fn loads_yaml_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.yml");
        std::fs::write(
            &path,
            "inputs:\n  x: {type: float, default: 4}\nsteps:\n  - id: s\n    op: scale\n    inputs:\n      x: {source: x}\noutputs:\n  return: s.return\n",
        )
        .unwrap();

        let pipeline = Pipeline::load(&path).unwrap();
        assert_eq!(pipeline.name, "flow");
        assert_eq!(pipeline.output_names().collect::<Vec<_>>(), vec!["return"]);

        let defaults: Vec<(&str, Value)> = vec![("x", Value::Float(4.0))];
        let outputs = run(&pipeline, &defaults).unwrap();
        assert_eq!(outputs["return"], Value::Float(8.0));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Pipeline::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
