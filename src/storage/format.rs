//! Fitness-scored format dispatch
//!
//! Every [`FormatHandler`] scores how well it can read a file or write a
//! value. The [`FormatRegistry`] asks all registered handlers, picks the
//! highest score and delegates. Negative scores mean "cannot handle"; equal
//! scores go to the handler registered first.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::Value;

/// Score meaning "this handler cannot service the request"
pub const CANNOT_HANDLE: i32 = -1;

/// Errors raised by a single handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(serde_json::Error),

    #[error("not a dataset container: {0}")]
    Container(String),

    #[error("cannot encode a {0} value")]
    Unsupported(&'static str),
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Json(err)
    }
}

/// Errors raised while choosing or running a handler
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("format '{0}' is already registered")]
    Duplicate(String),

    #[error("no suitable format found to read '{}'", .0.display())]
    NoReader(PathBuf),

    #[error("no suitable format found to write a {0} value")]
    NoWriter(&'static str),

    #[error("failed to read '{}' as {format}: {cause}", .path.display())]
    Read {
        format: String,
        path: PathBuf,
        cause: HandlerError,
    },

    #[error("failed to write '{}' as {format}: {cause}", .path.display())]
    Write {
        format: String,
        path: PathBuf,
        cause: HandlerError,
    },
}

/// One persistence format
///
/// Fitness probes report trouble through `Err`; the registry treats any
/// probe error as [`CANNOT_HANDLE`].
pub trait FormatHandler: Send + Sync {
    /// Unique format name, matched case-insensitively
    fn format_name(&self) -> &str;

    /// Preferred filename extension, including the dot
    fn filename_ext(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Confidence that `source` can be read by this handler
    fn read_fitness(&self, source: &Path) -> Result<i32, HandlerError>;

    /// Confidence that `value` can be written by this handler
    fn write_fitness(&self, value: &Value) -> Result<i32, HandlerError>;

    fn read(&self, source: &Path) -> Result<Value, HandlerError>;

    fn write(&self, value: &Value, destination: &Path) -> Result<(), HandlerError>;
}

/// Ordered collection of format handlers
#[derive(Default)]
pub struct FormatRegistry {
    handlers: Vec<Box<dyn FormatHandler>>,
}

impl FormatRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in text, JSON and dataset formats
    pub fn with_builtin() -> Self {
        Self {
            handlers: vec![
                Box::new(super::TextFormat),
                Box::new(super::JsonFormat),
                Box::new(super::DatasetFormat::compressed()),
                Box::new(super::DatasetFormat::plain()),
            ],
        }
    }

    /// Appends a handler; earlier handlers win ties
    ///
    /// A handler whose name is already taken (case-insensitively) is rejected
    /// unless `force` is set, in which case it replaces the old one in place.
    pub fn register(&mut self, handler: Box<dyn FormatHandler>, force: bool) -> Result<(), FormatError> {
        match self.position(handler.format_name()) {
            Some(_) if !force => Err(FormatError::Duplicate(handler.format_name().to_string())),
            Some(index) => {
                self.handlers[index] = handler;
                Ok(())
            }
            None => {
                self.handlers.push(handler);
                Ok(())
            }
        }
    }

    /// Removes a handler by case-insensitive format name
    pub fn remove(&mut self, format_name: &str) -> Result<Box<dyn FormatHandler>, FormatError> {
        let index = self
            .position(format_name)
            .ok_or_else(|| FormatError::UnknownFormat(format_name.to_string()))?;
        Ok(self.handlers.remove(index))
    }

    fn position(&self, format_name: &str) -> Option<usize> {
        self.handlers
            .iter()
            .position(|h| h.format_name().eq_ignore_ascii_case(format_name))
    }

    /// Iterates handlers in registration order
    pub fn handlers(&self) -> impl Iterator<Item = &dyn FormatHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    /// Finds a handler by case-insensitive format name
    pub fn find(&self, format_name: &str) -> Option<&dyn FormatHandler> {
        self.handlers()
            .find(|h| h.format_name().eq_ignore_ascii_case(format_name))
    }

    /// Chooses the handler best able to read `source`
    pub fn resolve_reader(
        &self,
        source: &Path,
        requested_format: Option<&str>,
    ) -> Result<&dyn FormatHandler, FormatError> {
        if let Some(name) = requested_format {
            return self
                .find(name)
                .ok_or_else(|| FormatError::UnknownFormat(name.to_string()));
        }

        self.best_by(|h| h.read_fitness(source))
            .ok_or_else(|| FormatError::NoReader(source.to_path_buf()))
    }

    /// Chooses the handler best able to write `value`
    pub fn resolve_writer(
        &self,
        value: &Value,
        requested_format: Option<&str>,
    ) -> Result<&dyn FormatHandler, FormatError> {
        if let Some(name) = requested_format {
            return self
                .find(name)
                .ok_or_else(|| FormatError::UnknownFormat(name.to_string()));
        }

        self.best_by(|h| h.write_fitness(value))
            .ok_or_else(|| FormatError::NoWriter(value.type_name()))
    }

    /// Reads `source` with the best (or the requested) handler
    pub fn read(&self, source: &Path, requested_format: Option<&str>) -> Result<Value, FormatError> {
        let handler = self.resolve_reader(source, requested_format)?;
        handler.read(source).map_err(|e| FormatError::Read {
            format: handler.format_name().to_string(),
            path: source.to_path_buf(),
            cause: e,
        })
    }

    /// Writes `value` to `destination` with the best (or the requested) handler
    ///
    /// Returns the name of the format used.
    pub fn write(
        &self,
        value: &Value,
        destination: &Path,
        requested_format: Option<&str>,
    ) -> Result<String, FormatError> {
        let handler = self.resolve_writer(value, requested_format)?;
        let format = handler.format_name().to_string();
        match handler.write(value, destination) {
            Ok(()) => Ok(format),
            Err(cause) => Err(FormatError::Write {
                format,
                path: destination.to_path_buf(),
                cause,
            }),
        }
    }

    /// Highest non-negative score wins; the first of equal scores is kept
    fn best_by<F>(&self, mut fitness: F) -> Option<&dyn FormatHandler>
    where
        F: FnMut(&dyn FormatHandler) -> Result<i32, HandlerError>,
    {
        let mut best: Option<(&dyn FormatHandler, i32)> = None;

        for handler in self.handlers() {
            let score = fitness(handler).unwrap_or(CANNOT_HANDLE);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((handler, score));
            }
        }

        best.filter(|(_, score)| *score >= 0).map(|(handler, _)| handler)
    }
}
