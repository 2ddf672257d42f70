//! Execution resolver
//!
//! Turns a `run` request into one operation call or one pipeline run.
//! Argument syntax is checked before the target is looked up, so a malformed
//! command line is reported the same way whether or not the target exists.

use std::io::Write;
use std::path::Path;

use serde_json::json;

use super::binding::{bind, parse_args, RawArg};
use super::error::RunError;
use super::pipeline::Pipeline;
use crate::domain::{ConsoleMonitor, Monitor, NullMonitor, Value};
use crate::ops::{Bindings, Operation, ParamSpec};
use crate::runtime::Runtime;
use crate::storage::FormatRegistry;

/// What the user asked `run` to do
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub target: Option<String>,
    pub args: Vec<String>,
    pub monitor: bool,
}

/// A resolved run target
#[derive(Debug, Clone)]
pub enum Target {
    Operation(Operation),
    Pipeline { path: String, pipeline: Pipeline },
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Operation(_) => "operation",
            Target::Pipeline { .. } => "workflow",
        }
    }

    /// The name shown in reports: qualified name or pipeline path
    pub fn display_name(&self) -> &str {
        match self {
            Target::Operation(op) => &op.qualified_name,
            Target::Pipeline { path, .. } => path,
        }
    }

    pub fn params(&self) -> Vec<ParamSpec> {
        match self {
            Target::Operation(op) => op.params.clone(),
            Target::Pipeline { pipeline, .. } => pipeline.params(),
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Return value of a single operation
    Single(Value),
    /// Named outputs of a pipeline
    Named(Bindings),
}

impl RunOutcome {
    /// Writes the `Output: ...` lines
    pub fn report(&self, out: &mut dyn Write) -> std::io::Result<()> {
        match self {
            RunOutcome::Single(Value::Null) => Ok(()),
            RunOutcome::Single(value) => writeln!(out, "Output: {}", value),
            RunOutcome::Named(outputs) => {
                for (name, value) in outputs {
                    writeln!(out, "Output: {} = {}", name, value)?;
                }
                Ok(())
            }
        }
    }

    /// The value written by `--write`
    ///
    /// A pipeline with exactly one output persists that output alone.
    pub fn persisted_value(&self) -> Value {
        match self {
            RunOutcome::Single(value) => value.clone(),
            RunOutcome::Named(outputs) if outputs.len() == 1 => {
                outputs.values().next().cloned().unwrap_or(Value::Null)
            }
            RunOutcome::Named(outputs) => Value::Map(outputs.clone()),
        }
    }

    /// Persists the outcome through the format dispatcher
    ///
    /// Returns the name of the format used.
    pub fn persist(
        &self,
        formats: &FormatRegistry,
        destination: &Path,
        requested_format: Option<&str>,
    ) -> Result<String, RunError> {
        Ok(formats.write(&self.persisted_value(), destination, requested_format)?)
    }

    /// JSON rendering; values without a JSON form fall back to their text
    pub fn to_json(&self) -> serde_json::Value {
        fn render(value: &Value) -> serde_json::Value {
            value
                .to_json()
                .unwrap_or_else(|| serde_json::Value::String(value.to_string()))
        }
        match self {
            RunOutcome::Single(value) => json!({ "output": render(value) }),
            RunOutcome::Named(outputs) => {
                let map: serde_json::Map<String, serde_json::Value> = outputs
                    .iter()
                    .map(|(k, v)| (k.clone(), render(v)))
                    .collect();
                json!({ "outputs": map })
            }
        }
    }
}

/// Resolves and runs targets against a runtime's registries
pub struct Resolver<'r> {
    runtime: &'r Runtime,
}

impl<'r> Resolver<'r> {
    pub fn new(runtime: &'r Runtime) -> Self {
        Self { runtime }
    }

    /// An existing file is a pipeline; anything else must be an operation name
    pub fn resolve(&self, target: &str) -> Result<Target, RunError> {
        let path = Path::new(target);
        if path.is_file() {
            let pipeline = Pipeline::load(path)?;
            return Ok(Target::Pipeline {
                path: target.to_string(),
                pipeline,
            });
        }
        self.runtime
            .operations
            .lookup(target)
            .cloned()
            .map(Target::Operation)
            .ok_or_else(|| RunError::UnknownOperation(target.to_string()))
    }

    /// Runs a request, writing the `Running ...` line and progress to `out`
    pub fn run(&self, request: &RunRequest, out: &mut dyn Write) -> Result<RunOutcome, RunError> {
        let target_name = request.target.as_deref().ok_or(RunError::MissingTarget)?;
        let raw = parse_args(&request.args)?;

        let target = self.resolve(target_name)?;
        let params = target.params();
        let bindings = bind(target.display_name(), &params, &raw, &self.runtime.formats)?;

        writeln!(
            out,
            "Running {} {}",
            target.kind(),
            announce(target.display_name(), &params, &raw)
        )?;

        let mut console;
        let mut null = NullMonitor;
        let monitor: &mut dyn Monitor = if request.monitor {
            console = ConsoleMonitor::new(&mut *out);
            &mut console
        } else {
            &mut null
        };

        let ctx = self.runtime.op_context();
        match &target {
            Target::Operation(op) => op
                .call(&bindings, &ctx, monitor)
                .map(RunOutcome::Single)
                .map_err(RunError::Execution),
            Target::Pipeline { pipeline, .. } => Ok(RunOutcome::Named(pipeline.run(
                &bindings,
                &self.runtime.operations,
                &ctx,
                monitor,
            )?)),
        }
    }
}

/// `name k=v ...`: supplied arguments as typed, then unsupplied defaults
fn announce(name: &str, params: &[ParamSpec], raw: &[RawArg]) -> String {
    let mut parts = vec![name.to_string()];
    for arg in raw {
        parts.push(format!("{}={}", arg.name, arg.value));
    }
    for param in params {
        if raw.iter().any(|a| a.name == param.name) {
            continue;
        }
        match &param.default {
            Some(Value::Null) | None => {}
            Some(default) => parts.push(format!("{}={}", param.name, default)),
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::ParamType;
    use tempfile::TempDir;

    /// Stand-in for a long-running extraction that reports progress
    fn timeseries() -> Operation {
        Operation::new("timeseries", |args, _ctx, monitor| {
            if !matches!(args.get("lat"), Some(Value::Float(_))) {
                anyhow::bail!("lat missing");
            }
            monitor.start("Extracting timeseries data", 3.0);
            for _ in 0..3 {
                monitor.progress(1.0);
            }
            monitor.done();
            Ok(Value::from(vec![0.3, 0.25, 0.05]))
        })
        .param(ParamSpec::required("lat", ParamType::Float))
        .param(ParamSpec::required("lon", ParamType::Float))
        .param(ParamSpec::optional("method", ParamType::Str, "nearest"))
    }

    fn runtime() -> Runtime {
        let mut runtime = Runtime::with_builtin().unwrap();
        runtime.operations.add(timeseries(), false).unwrap();
        runtime
    }

    fn request(target: &str, args: &[&str]) -> RunRequest {
        RunRequest {
            target: Some(target.to_string()),
            args: args.iter().map(|s| s.to_string()).collect(),
            monitor: false,
        }
    }

    fn run(runtime: &Runtime, req: &RunRequest) -> (Result<RunOutcome, RunError>, String) {
        let mut out = Vec::new();
        let result = Resolver::new(runtime).run(req, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn operation_run_echoes_arguments_and_defaults() {
        let runtime = runtime();
        let (result, out) = run(&runtime, &request("timeseries", &["lat=13.2", "lon=52.9"]));

        assert_eq!(out, "Running operation timeseries lat=13.2 lon=52.9 method=nearest\n");
        let outcome = result.unwrap();
        let mut report = Vec::new();
        outcome.report(&mut report).unwrap();
        assert_eq!(String::from_utf8(report).unwrap(), "Output: [0.3, 0.25, 0.05]\n");
    }

    #[test]
    fn monitor_reports_progress() {
        let runtime = runtime();
        let mut req = request("timeseries", &["lat=13.2", "lon=52.9"]);
        req.monitor = true;
        let (result, out) = run(&runtime, &req);

        assert!(result.is_ok());
        assert!(out.contains("Extracting timeseries data: started"));
        assert!(out.contains("Extracting timeseries data:  33%"));
        assert!(out.contains("Extracting timeseries data: 100%"));
        assert!(out.contains("Extracting timeseries data: done"));
    }

    #[test]
    fn missing_target_is_usage_error() {
        let runtime = runtime();
        let (result, out) = run(&runtime, &RunRequest::default());
        assert!(matches!(result, Err(RunError::MissingTarget)));
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_operation() {
        let runtime = runtime();
        let (result, _) = run(&runtime, &request("pipapo", &["lat=13.2", "lon=52.9"]));
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "unknown operation 'pipapo'");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn argument_syntax_checked_before_lookup() {
        let runtime = runtime();
        let (result, out) = run(&runtime, &request("pipapo", &["l*t=13.2", "lon=52.9"]));
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "keyword 'l*t' is not a valid identifier");
        assert_eq!(err.exit_code(), 2);
        assert!(out.is_empty());
    }

    #[test]
    fn operation_failure_is_execution_error() {
        let runtime = runtime();
        let (result, _) = run(&runtime, &request("read_text", &["file=/nonexistent/ect/none.txt"]));
        let err = result.unwrap_err();
        assert!(matches!(err, RunError::Execution(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn existing_file_runs_as_pipeline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extract.json");
        std::fs::write(
            &path,
            r#"{
                "inputs": {"lat": {"type": "float"}, "lon": {"type": "float"}},
                "steps": [{"id": "ts", "op": "timeseries",
                           "inputs": {"lat": {"source": "lat"}, "lon": {"source": "lon"}}}],
                "outputs": {"return": "ts.return"}
            }"#,
        )
        .unwrap();
        let runtime = runtime();
        let target = path.to_string_lossy().into_owned();

        let (result, out) = run(&runtime, &request(&target, &["lat=13.2", "lon=52.9"]));

        assert_eq!(out, format!("Running workflow {} lat=13.2 lon=52.9\n", target));
        let outcome = result.unwrap();
        let mut report = Vec::new();
        outcome.report(&mut report).unwrap();
        assert_eq!(
            String::from_utf8(report).unwrap(),
            "Output: return = [0.3, 0.25, 0.05]\n"
        );
    }

    #[test]
    fn persisted_outcome_round_trips() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.json");
        let runtime = runtime();
        let outcome = RunOutcome::Single(Value::from(vec![1i64, 2, 3]));

        let format = outcome.persist(&runtime.formats, &dest, None).unwrap();
        assert_eq!(format, "JSON");
        assert_eq!(
            runtime.formats.read(&dest, None).unwrap(),
            Value::from(vec![1i64, 2, 3])
        );
    }

    #[test]
    fn multiple_outputs_persist_as_map() {
        let mut outputs = Bindings::new();
        outputs.insert("a".into(), Value::Int(1));
        outputs.insert("b".into(), Value::Int(2));
        let outcome = RunOutcome::Named(outputs.clone());

        assert_eq!(outcome.persisted_value(), Value::Map(outputs));
        assert_eq!(outcome.to_json(), json!({"outputs": {"a": 1, "b": 2}}));
    }
}
