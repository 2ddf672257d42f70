//! Input/output operations
//!
//! These wrap the format dispatcher and the individual formats so that files
//! can be read and written from the command line and from pipelines.

use std::path::Path;

use anyhow::{bail, Context, Result};

use super::operation::{Bindings, Operation, ParamSpec, ParamType};
use super::OperationRegistry;
use crate::domain::{Dataset, Monitor, Value, Variable};
use crate::storage::{write_dataset, ContainerEncoding, FormatHandler, JsonFormat, TextFormat};

pub(super) fn register(registry: &mut OperationRegistry) -> Result<()> {
    for op in [
        read_object(),
        write_object(),
        read_text(),
        write_text(),
        read_json(),
        write_json(),
        read_dataset(),
        write_dataset_op(),
    ] {
        registry.add(op, false)?;
    }
    Ok(())
}

/// Fetches an argument the binder guarantees to be present
pub(super) fn arg<'a>(args: &'a Bindings, name: &str) -> Result<&'a Value> {
    args.get(name)
        .with_context(|| format!("missing argument '{}'", name))
}

pub(super) fn str_arg<'a>(args: &'a Bindings, name: &str) -> Result<&'a str> {
    match arg(args, name)? {
        Value::Str(s) => Ok(s),
        other => bail!("argument '{}' must be a string, got {}", name, other.type_name()),
    }
}

/// An optional string argument; `null` counts as absent
fn opt_str_arg<'a>(args: &'a Bindings, name: &str) -> Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => str_arg(args, name).map(Some),
    }
}

/// Accepts a missing `encoding` or any spelling of UTF-8
fn check_encoding(args: &Bindings) -> Result<()> {
    match opt_str_arg(args, "encoding")? {
        None => Ok(()),
        Some(name) if is_utf8(name) => Ok(()),
        Some(name) => bail!("unsupported encoding '{}': only UTF-8 is available", name),
    }
}

fn is_utf8(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().replace('_', "-").as_str(),
        "utf-8" | "utf8"
    )
}

fn encoding_param() -> ParamSpec {
    ParamSpec::optional("encoding", ParamType::Str, Value::Null).describe("Text encoding, UTF-8 only")
}

fn read_object() -> Operation {
    Operation::new("read_object", |args, ctx, _monitor| {
        let file = str_arg(args, "file")?;
        let format = opt_str_arg(args, "format")?;
        Ok(ctx.formats.read(Path::new(file), format)?)
    })
    .describe("Read an object from a file, choosing the format automatically unless given")
    .tag("io")
    .param(ParamSpec::required("file", ParamType::Str))
    .param(ParamSpec::optional("format", ParamType::Str, Value::Null))
}

fn write_object() -> Operation {
    Operation::new("write_object", |args, ctx, _monitor| {
        let obj = arg(args, "obj")?;
        let file = str_arg(args, "file")?;
        let format = opt_str_arg(args, "format")?;
        ctx.formats.write(obj, Path::new(file), format)?;
        Ok(Value::Null)
    })
    .describe("Write an object to a file, choosing the format automatically unless given")
    .tag("io")
    .param(ParamSpec::required("obj", ParamType::Any))
    .param(ParamSpec::required("file", ParamType::Str))
    .param(ParamSpec::optional("format", ParamType::Str, Value::Null))
}

fn read_text() -> Operation {
    Operation::new("read_text", |args, _ctx, _monitor| {
        check_encoding(args)?;
        let file = str_arg(args, "file")?;
        Ok(TextFormat.read(Path::new(file))?)
    })
    .describe("Read a text file into a string")
    .tag("io")
    .param(ParamSpec::required("file", ParamType::Str))
    .param(encoding_param())
}

fn write_text() -> Operation {
    Operation::new("write_text", |args, _ctx, _monitor| {
        check_encoding(args)?;
        TextFormat.write(arg(args, "obj")?, Path::new(str_arg(args, "file")?))?;
        Ok(Value::Null)
    })
    .describe("Write the text form of an object to a file")
    .tag("io")
    .param(ParamSpec::required("obj", ParamType::Any))
    .param(ParamSpec::required("file", ParamType::Str))
    .param(encoding_param())
}

fn read_json() -> Operation {
    Operation::new("read_json", |args, _ctx, _monitor| {
        check_encoding(args)?;
        let file = str_arg(args, "file")?;
        Ok(JsonFormat.read(Path::new(file))?)
    })
    .describe("Read a JSON file")
    .tag("io")
    .param(ParamSpec::required("file", ParamType::Str))
    .param(encoding_param())
}

fn write_json() -> Operation {
    Operation::new("write_json", |args, _ctx, _monitor| {
        check_encoding(args)?;
        let indent = match args.get("indent") {
            None | Some(Value::Null) => None,
            Some(Value::Int(n)) if *n >= 0 => Some(*n as usize),
            Some(other) => bail!("indent must be a non-negative integer, got {}", other),
        };
        JsonFormat::write_with_indent(arg(args, "obj")?, Path::new(str_arg(args, "file")?), indent)?;
        Ok(Value::Null)
    })
    .describe("Write an object as JSON")
    .tag("io")
    .param(ParamSpec::required("obj", ParamType::Any))
    .param(ParamSpec::required("file", ParamType::Str))
    .param(encoding_param())
    .param(ParamSpec::optional("indent", ParamType::Int, Value::Null))
}

/// Checks that a variable's dimensions exist and its data fills them
fn check_variable(ds: &Dataset, name: &str, var: &Variable) -> Result<()> {
    let mut expected = 1usize;
    for dim in &var.dims {
        let size = ds
            .dims
            .get(dim)
            .with_context(|| format!("variable '{}' uses unknown dimension '{}'", name, dim))?;
        expected *= size;
    }
    if var.data.len() != expected {
        bail!(
            "variable '{}' holds {} values, its dimensions need {}",
            name,
            var.data.len(),
            expected
        );
    }
    Ok(())
}

/// Checks every variable, reporting one unit of work spread over them
fn check_variables(ds: &Dataset, monitor: &mut dyn Monitor) -> Result<()> {
    if ds.variables.is_empty() {
        monitor.progress(1.0);
        return Ok(());
    }
    let share = 1.0 / ds.variables.len() as f64;
    for (name, var) in &ds.variables {
        check_variable(ds, name, var)?;
        monitor.progress(share);
    }
    Ok(())
}

fn read_dataset() -> Operation {
    Operation::new("read_dataset", |args, _ctx, monitor| {
        let file = str_arg(args, "file")?;
        monitor.start(&format!("Reading dataset {}", file), 2.0);
        let dataset = crate::storage::read_dataset(Path::new(file))
            .with_context(|| format!("cannot read dataset '{}'", file))?;
        monitor.progress(1.0);
        check_variables(&dataset, monitor)?;
        monitor.done();
        Ok(Value::from(dataset))
    })
    .describe("Read a dataset container file")
    .tag("io")
    .param(ParamSpec::required("file", ParamType::Str))
}

fn write_dataset_op() -> Operation {
    Operation::new("write_dataset", |args, _ctx, monitor| {
        let ds = match arg(args, "ds")? {
            Value::Dataset(ds) => ds,
            other => bail!("argument 'ds' must be a dataset, got {}", other.type_name()),
        };
        let file = str_arg(args, "file")?;
        let encoding = match arg(args, "compress")? {
            Value::Bool(false) => ContainerEncoding::Plain,
            _ => ContainerEncoding::Gzip,
        };
        monitor.start(&format!("Writing dataset {}", file), 2.0);
        check_variables(ds, monitor)?;
        write_dataset(ds, Path::new(file), encoding)
            .with_context(|| format!("cannot write dataset '{}'", file))?;
        monitor.progress(1.0);
        monitor.done();
        Ok(Value::Null)
    })
    .describe("Write a dataset to a container file")
    .tag("io")
    .param(ParamSpec::required("ds", ParamType::Dataset))
    .param(ParamSpec::required("file", ParamType::Str))
    .param(ParamSpec::optional("compress", ParamType::Bool, true))
}
