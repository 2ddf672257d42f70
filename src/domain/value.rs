//! Values flowing between operations, pipelines and format handlers
//!
//! A [`Value`] is what an operation returns and what a format handler
//! persists. Everything except [`Dataset`] has a direct JSON form.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::period::DateRange;

/// A gridded dataset: named dimensions, variables over them and attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Dimension name to size
    #[serde(default)]
    pub dims: BTreeMap<String, usize>,

    /// Data variables
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,

    /// Global attributes
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

/// A single data variable stored as a flat, row-major array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Dimension names, outermost first
    pub dims: Vec<String>,

    /// Flattened values
    #[serde(with = "float_data")]
    pub data: Vec<f64>,

    /// Variable attributes
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

/// Serde codec for variable data
///
/// JSON has no NaN or infinity: NaN is stored as `null`, infinities as the
/// strings `"inf"` and `"-inf"`.
mod float_data {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Special(Option<String>),
    }

    pub fn serialize<S: Serializer>(data: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(data.len()))?;
        for x in data {
            if x.is_nan() {
                seq.serialize_element(&None::<f64>)?;
            } else if x.is_infinite() {
                seq.serialize_element(if *x > 0.0 { "inf" } else { "-inf" })?;
            } else {
                seq.serialize_element(x)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Cell>::deserialize(deserializer)?
            .into_iter()
            .map(|cell| match cell {
                Cell::Number(x) => Ok(x),
                Cell::Special(None) => Ok(f64::NAN),
                Cell::Special(Some(text)) => match text.as_str() {
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(D::Error::custom(format!("invalid data value '{}'", other))),
                },
            })
            .collect()
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dimension, replacing any previous size
    pub fn with_dim(mut self, name: impl Into<String>, size: usize) -> Self {
        self.dims.insert(name.into(), size);
        self
    }

    /// Adds a variable over existing dimensions
    pub fn with_var(mut self, name: impl Into<String>, dims: &[&str], data: Vec<f64>) -> Self {
        self.variables.insert(
            name.into(),
            Variable {
                dims: dims.iter().map(|d| d.to_string()).collect(),
                data,
                attrs: BTreeMap::new(),
            },
        );
        self
    }

    /// Sets a global attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|(name, size)| format!("{}: {}", name, size))
            .collect();
        let vars: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        write!(
            f,
            "<Dataset dims=({}) variables=[{}]>",
            dims.join(", "),
            vars.join(", ")
        )
    }
}

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Period(DateRange),
    Dataset(Box<Dataset>),
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Period(_) => "period",
            Value::Dataset(_) => "dataset",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Value::Dataset(ds) => Some(&**ds),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts to JSON; `None` if a dataset or a NaN/infinite float is
    /// nested anywhere inside
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        Some(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(x) => Json::Number(serde_json::Number::from_f64(*x)?),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| v.to_json().map(|j| (k.clone(), j)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Period(range) => Json::Array(vec![
                Json::String(range.start.to_string()),
                Json::String(range.end.to_string()),
            ]),
            Value::Dataset(_) => return None,
        })
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(entries) => {
                Value::Map(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Dataset> for Value {
    fn from(ds: Dataset) -> Self {
        Value::Dataset(Box::new(ds))
    }
}

impl From<DateRange> for Value {
    fn from(range: DateRange) -> Self {
        Value::Period(range)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Renders a value nested inside a list or map (strings quoted)
struct Nested<'a>(&'a Value);

impl fmt::Display for Nested<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Str(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Nested(item))?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", key, Nested(value))?;
                }
                write!(f, "}}")
            }
            Value::Period(range) => write!(f, "{}", range),
            Value::Dataset(ds) => write!(f, "{}", ds),
        }
    }
}
