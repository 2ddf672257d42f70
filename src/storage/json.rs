//! JSON format
//!
//! Scalars, lists, maps and periods have a JSON form; datasets, nulls and
//! anything holding a NaN or infinite float do not score here.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::format::{FormatHandler, HandlerError};
use super::text::file_fitness;
use crate::domain::Value;

/// JSON text files (UTF-8)
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

impl JsonFormat {
    /// Writes `value` as JSON with an optional indent width
    pub fn write_with_indent(
        value: &Value,
        destination: &Path,
        indent: Option<usize>,
    ) -> Result<(), HandlerError> {
        let json = value
            .to_json()
            .ok_or(HandlerError::Unsupported(value.type_name()))?;

        let mut writer = BufWriter::new(File::create(destination)?);
        match indent {
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
                serde::Serialize::serialize(&json, &mut ser)?;
            }
            None => serde_json::to_writer(&mut writer, &json)?,
        }
        writer.flush()?;
        Ok(())
    }
}

impl FormatHandler for JsonFormat {
    fn format_name(&self) -> &str {
        "JSON"
    }

    fn filename_ext(&self) -> &str {
        ".json"
    }

    fn description(&self) -> &str {
        "JSON format (plain text, UTF8)"
    }

    fn read_fitness(&self, source: &Path) -> Result<i32, HandlerError> {
        Ok(file_fitness(source, self.filename_ext()))
    }

    fn write_fitness(&self, value: &Value) -> Result<i32, HandlerError> {
        Ok(match value {
            Value::Null | Value::Dataset(_) => 0,
            _ if value.to_json().is_none() => 0,
            _ => 1000,
        })
    }

    fn read(&self, source: &Path) -> Result<Value, HandlerError> {
        let reader = BufReader::new(File::open(source)?);
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        Ok(Value::from(json))
    }

    fn write(&self, value: &Value, destination: &Path) -> Result<(), HandlerError> {
        Self::write_with_indent(value, destination, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dataset;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn write_fitness_by_kind() {
        assert_eq!(JsonFormat.write_fitness(&Value::from(vec![1i64, 2])).unwrap(), 1000);
        assert_eq!(JsonFormat.write_fitness(&Value::Null).unwrap(), 0);
        assert_eq!(JsonFormat.write_fitness(&Value::from(Dataset::new())).unwrap(), 0);
        assert_eq!(JsonFormat.write_fitness(&Value::from(vec![1.5, f64::INFINITY])).unwrap(), 0);
    }

    #[test]
    fn refuses_non_finite_floats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.json");

        let err = JsonFormat.write(&Value::from(vec![1.5, f64::NAN]), &path).unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported("list")));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values.json");
        let value = Value::from(serde_json::json!({"lat": 13.2, "names": ["a", "b"], "n": 4}));

        JsonFormat.write(&value, &path).unwrap();
        assert_eq!(JsonFormat.read(&path).unwrap(), value);
    }

    #[test]
    fn indent_is_applied() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values.json");

        JsonFormat::write_with_indent(&Value::from(vec![1i64]), &path, Some(2)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[\n  1\n]");
    }

    #[test]
    fn refuses_nested_datasets() {
        let dir = TempDir::new().unwrap();
        let value = Value::List(vec![Value::from(Dataset::new())]);

        let err = JsonFormat.write(&value, &dir.path().join("x.json")).unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported("list")));
    }

    #[test]
    fn invalid_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(JsonFormat.read(&path), Err(HandlerError::Json(_))));
    }
}
