//! Plain text format
//!
//! Anything can be written as text through its display form, so this
//! handler is the fallback writer. Strings are its specialty.

use std::fs;
use std::path::Path;

use super::format::{FormatHandler, HandlerError};
use crate::domain::Value;

/// Score for an existing file whose extension matches the handler
pub(crate) const EXT_MATCH_FITNESS: i32 = 10;

/// Score for any other existing file
pub(crate) const ANY_FILE_FITNESS: i32 = 1;

/// Read fitness shared by the plain-file formats
pub(crate) fn file_fitness(source: &Path, ext: &str) -> i32 {
    if !source.is_file() {
        return 0;
    }
    let matches_ext = source
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ext.trim_start_matches('.').eq_ignore_ascii_case(e));
    if matches_ext {
        EXT_MATCH_FITNESS
    } else {
        ANY_FILE_FITNESS
    }
}

/// UTF-8 text files
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFormat;

impl FormatHandler for TextFormat {
    fn format_name(&self) -> &str {
        "TEXT"
    }

    fn filename_ext(&self) -> &str {
        ".txt"
    }

    fn description(&self) -> &str {
        "Plain text format"
    }

    fn read_fitness(&self, source: &Path) -> Result<i32, HandlerError> {
        Ok(file_fitness(source, self.filename_ext()))
    }

    fn write_fitness(&self, value: &Value) -> Result<i32, HandlerError> {
        Ok(match value {
            Value::Str(_) => 1000,
            _ => 1,
        })
    }

    fn read(&self, source: &Path) -> Result<Value, HandlerError> {
        Ok(Value::Str(fs::read_to_string(source)?))
    }

    fn write(&self, value: &Value, destination: &Path) -> Result<(), HandlerError> {
        fs::write(destination, value.to_string())?;
        Ok(())
    }
}
