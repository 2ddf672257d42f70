//! Argument parsing and binding
//!
//! Raw `key=value` tokens are checked syntactically first. Once the target's
//! parameters are known they are bound: unknown names and missing required
//! inputs are rejected, then each value is coerced to its declared type.

use std::path::Path;

use super::error::RunError;
use crate::domain::{parse_time_period, Value};
use crate::ops::{Bindings, ParamSpec, ParamType};
use crate::storage::FormatRegistry;

/// A syntactically valid `name=value` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArg {
    pub name: String,
    pub value: String,
}

/// Letters, digits and underscores, not starting with a digit
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Splits each token on its first `=` and validates the name
pub fn parse_args<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<RawArg>, RunError> {
    tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            let (name, value) = token
                .split_once('=')
                .ok_or_else(|| RunError::MalformedArgument(token.to_string()))?;
            if !is_identifier(name) {
                return Err(RunError::InvalidArgumentName(name.to_string()));
            }
            Ok(RawArg {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Binds raw arguments to `params`, filling in defaults
///
/// Later duplicates of a name override earlier ones.
pub fn bind(
    target: &str,
    params: &[ParamSpec],
    args: &[RawArg],
    formats: &FormatRegistry,
) -> Result<Bindings, RunError> {
    if let Some(unknown) = args.iter().find(|a| !params.iter().any(|p| p.name == a.name)) {
        return Err(RunError::UnknownInput {
            target: target.to_string(),
            name: unknown.name.clone(),
        });
    }

    let missing: Vec<String> = params
        .iter()
        .filter(|p| p.is_required() && !args.iter().any(|a| a.name == p.name))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(RunError::MissingArguments {
            target: target.to_string(),
            names: missing,
        });
    }

    let mut bindings = Bindings::new();
    for param in params {
        match args.iter().rev().find(|a| a.name == param.name) {
            Some(arg) => {
                let value = coerce_text(&param.name, &arg.value, param.param_type, formats)?;
                bindings.insert(param.name.clone(), value);
            }
            None => {
                if let Some(default) = &param.default {
                    bindings.insert(param.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(bindings)
}

fn invalid(name: &str, detail: String) -> RunError {
    RunError::InvalidArgumentValue {
        name: name.to_string(),
        detail,
    }
}

fn expected(name: &str, param_type: ParamType, raw: &str) -> RunError {
    invalid(name, format!("expected {}, got '{}'", param_type, raw))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Converts command-line text into a value of the declared type
pub fn coerce_text(
    name: &str,
    raw: &str,
    param_type: ParamType,
    formats: &FormatRegistry,
) -> Result<Value, RunError> {
    match param_type {
        ParamType::Str | ParamType::Any => Ok(Value::from(raw)),
        ParamType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| expected(name, param_type, raw)),
        ParamType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| expected(name, param_type, raw)),
        ParamType::Bool => parse_bool(raw.trim())
            .map(Value::Bool)
            .ok_or_else(|| expected(name, param_type, raw)),
        ParamType::Period => parse_time_period(raw)
            .map(Value::Period)
            .ok_or_else(|| expected(name, param_type, raw)),
        ParamType::Object => formats
            .read(Path::new(raw), None)
            .map_err(|e| invalid(name, e.to_string())),
        ParamType::Dataset => match formats.read(Path::new(raw), None) {
            Ok(value @ Value::Dataset(_)) => Ok(value),
            Ok(other) => Err(invalid(
                name,
                format!("'{}' holds a {}, not a dataset", raw, other.type_name()),
            )),
            Err(e) => Err(invalid(name, e.to_string())),
        },
    }
}

/// Checks an in-process value against a declared type
///
/// Strings are still parsed for scalar and period types, so pipeline
/// constants may be written as text.
pub fn coerce_value(name: &str, value: Value, param_type: ParamType) -> Result<Value, RunError> {
    match (param_type, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ParamType::Any | ParamType::Object, value) => Ok(value),
        (ParamType::Str, value @ Value::Str(_)) => Ok(value),
        (ParamType::Str, value @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
            Ok(Value::Str(value.to_string()))
        }
        (ParamType::Int, value @ Value::Int(_)) => Ok(value),
        (ParamType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (ParamType::Float, value @ Value::Float(_)) => Ok(value),
        (ParamType::Bool, value @ Value::Bool(_)) => Ok(value),
        (ParamType::Period, value @ Value::Period(_)) => Ok(value),
        (ParamType::Dataset, value @ Value::Dataset(_)) => Ok(value),
        (ParamType::Int | ParamType::Float | ParamType::Bool | ParamType::Period, Value::Str(raw)) => {
            // Formats are only needed for file-backed types, which never reach here
            coerce_text(name, &raw, param_type, &FormatRegistry::new())
        }
        (param_type, other) => Err(invalid(
            name,
            format!("expected {}, got {}", param_type, other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatasetFormat;
    use crate::storage::FormatHandler;
    use crate::domain::Dataset;
    use tempfile::TempDir;

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("lat", ParamType::Float),
            ParamSpec::required("lon", ParamType::Float),
            ParamSpec::optional("method", ParamType::Str, "nearest"),
        ]
    }

    fn raw(tokens: &[&str]) -> Vec<RawArg> {
        parse_args(tokens).unwrap()
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("lat"));
        assert!(is_identifier("_x1"));
        assert!(is_identifier("time_min"));
        assert!(!is_identifier("l*t"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn tokens_split_on_first_equals() {
        let args = raw(&["expr=a=b", "empty="]);
        assert_eq!(args[0].name, "expr");
        assert_eq!(args[0].value, "a=b");
        assert_eq!(args[1].value, "");
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = parse_args(&["l*t=13.2", "lon=52.9"]).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgumentName(ref n) if n == "l*t"));
        assert!(err.is_usage());
    }

    #[test]
    fn token_without_equals_is_rejected() {
        let err = parse_args(&["lat"]).unwrap_err();
        assert!(matches!(err, RunError::MalformedArgument(_)));
    }

    #[test]
    fn binds_with_defaults_and_coercion() {
        let formats = FormatRegistry::new();
        let bound = bind("ts", &params(), &raw(&["lat=13.2", "lon=52.9"]), &formats).unwrap();

        assert_eq!(bound["lat"], Value::Float(13.2));
        assert_eq!(bound["lon"], Value::Float(52.9));
        assert_eq!(bound["method"], Value::from("nearest"));
    }

    #[test]
    fn later_duplicates_win() {
        let formats = FormatRegistry::new();
        let bound = bind("ts", &params(), &raw(&["lat=1", "lon=2", "lat=3"]), &formats).unwrap();
        assert_eq!(bound["lat"], Value::Float(3.0));
    }

    #[test]
    fn missing_required_is_usage_error() {
        let formats = FormatRegistry::new();
        let err = bind("ts", &params(), &raw(&["lat=1"]), &formats).unwrap_err();

        assert!(err.is_usage());
        assert!(err.to_string().contains("lon"));
    }

    #[test]
    fn unknown_input_is_runtime_error() {
        let formats = FormatRegistry::new();
        let err = bind("ts", &params(), &raw(&["lat=1", "lon=2", "alt=3"]), &formats).unwrap_err();

        assert!(matches!(err, RunError::UnknownInput { ref name, .. } if name == "alt"));
        assert!(!err.is_usage());
    }

    #[test]
    fn coercion_failure_is_runtime_error() {
        let formats = FormatRegistry::new();
        let err = bind("ts", &params(), &raw(&["lat=north", "lon=2"]), &formats).unwrap_err();

        assert!(!err.is_usage());
        assert_eq!(err.to_string(), "invalid value for 'lat': expected float, got 'north'");
    }

    #[test]
    fn period_values_use_the_period_parser() {
        let formats = FormatRegistry::new();
        let value = coerce_text("t", "2010-12,2011-12", ParamType::Period, &formats).unwrap();
        assert_eq!(value.to_string(), "2010-12-01,2011-12-31");

        let err = coerce_text("t", "2010-12-31,2010-01", ParamType::Period, &formats).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgumentValue { .. }));
    }

    #[test]
    fn booleans() {
        let formats = FormatRegistry::new();
        assert_eq!(coerce_text("b", "Yes", ParamType::Bool, &formats).unwrap(), Value::Bool(true));
        assert_eq!(coerce_text("b", "0", ParamType::Bool, &formats).unwrap(), Value::Bool(false));
        assert!(coerce_text("b", "perhaps", ParamType::Bool, &formats).is_err());
    }

    #[test]
    fn dataset_params_load_through_dispatcher() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.dsc");
        let ds = Dataset::new().with_dim("x", 1);
        DatasetFormat::plain().write(&Value::from(ds.clone()), &path).unwrap();
        let formats = FormatRegistry::with_builtin();

        let value = coerce_text("ds", path.to_str().unwrap(), ParamType::Dataset, &formats).unwrap();
        assert_eq!(value, Value::from(ds));

        let text = dir.path().join("note.txt");
        std::fs::write(&text, "hello").unwrap();
        let err = coerce_text("ds", text.to_str().unwrap(), ParamType::Dataset, &formats).unwrap_err();
        assert!(err.to_string().contains("not a dataset"));
    }

    #[test]
    fn in_process_values() {
        assert_eq!(coerce_value("x", Value::Int(2), ParamType::Float).unwrap(), Value::Float(2.0));
        assert_eq!(coerce_value("x", Value::from("7"), ParamType::Int).unwrap(), Value::Int(7));
        assert_eq!(coerce_value("x", Value::Int(7), ParamType::Str).unwrap(), Value::from("7"));
        assert!(coerce_value("x", Value::from(vec![1i64]), ParamType::Dataset).is_err());
        assert_eq!(coerce_value("x", Value::from("p"), ParamType::Object).unwrap(), Value::from("p"));
    }
}
