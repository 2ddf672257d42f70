//! Operation descriptors and the operation registry

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Monitor, Value};
use crate::storage::FormatRegistry;

/// Keyword arguments bound to an operation call
pub type Bindings = BTreeMap<String, Value>;

/// Signature of an operation's entry point
pub type OperationFn =
    dyn Fn(&Bindings, &OpContext<'_>, &mut dyn Monitor) -> anyhow::Result<Value> + Send + Sync;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    Duplicate(String),

    #[error("operation '{0}' is not registered")]
    NotFound(String),
}

/// Declared type of an operation parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    /// Period expression such as `2010-01,2010-06`
    Period,
    /// Any value, loaded from a file path through the format dispatcher
    Object,
    /// A dataset, loaded from a file path through the format dispatcher
    Dataset,
    #[default]
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Str => "str",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Period => "period",
            ParamType::Object => "object",
            ParamType::Dataset => "dataset",
            ParamType::Any => "any",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" => Ok(ParamType::Str),
            "int" => Ok(ParamType::Int),
            "float" => Ok(ParamType::Float),
            "bool" => Ok(ParamType::Bool),
            "period" => Ok(ParamType::Period),
            "object" => Ok(ParamType::Object),
            "dataset" => Ok(ParamType::Dataset),
            "any" => Ok(ParamType::Any),
            other => Err(format!("unknown parameter type '{}'", other)),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    /// Value used when the caller omits the parameter; `None` means required
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    /// A required parameter
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: None,
            description: String::new(),
        }
    }

    /// An optional parameter with a default
    pub fn optional(name: impl Into<String>, param_type: ParamType, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::required(name, param_type)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Services available to a running operation
pub struct OpContext<'a> {
    pub formats: &'a FormatRegistry,
}

/// A registered operation
#[derive(Clone)]
pub struct Operation {
    pub qualified_name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub params: Vec<ParamSpec>,
    func: Arc<OperationFn>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("qualified_name", &self.qualified_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Operation {
    pub fn new<F>(qualified_name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Bindings, &OpContext<'_>, &mut dyn Monitor) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            qualified_name: qualified_name.into(),
            description: String::new(),
            tags: Vec::new(),
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Looks up a declared parameter
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Invokes the operation with already bound arguments
    pub fn call(
        &self,
        args: &Bindings,
        ctx: &OpContext<'_>,
        monitor: &mut dyn Monitor,
    ) -> anyhow::Result<Value> {
        (self.func)(args, ctx, monitor)
    }
}

/// All known operations, keyed by qualified name
#[derive(Debug, Default)]
pub struct OperationRegistry {
    ops: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation; duplicates are rejected unless `force` is set
    pub fn add(&mut self, op: Operation, force: bool) -> Result<(), RegistryError> {
        if !force && self.ops.contains_key(&op.qualified_name) {
            return Err(RegistryError::Duplicate(op.qualified_name));
        }
        self.ops.insert(op.qualified_name.clone(), op);
        Ok(())
    }

    /// Removes an operation by qualified name
    pub fn remove(&mut self, qualified_name: &str) -> Result<Operation, RegistryError> {
        self.ops
            .remove(qualified_name)
            .ok_or_else(|| RegistryError::NotFound(qualified_name.to_string()))
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<&Operation> {
        self.ops.get(qualified_name)
    }

    /// Iterates operations sorted by qualified name
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.values()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
