//! # Storage Layer
//!
//! Persistence formats and configuration.
//!
//! ## Formats
//!
//! | Name | Extension | Reads | Writes |
//! |------|-----------|-------|--------|
//! | `TEXT` | `.txt` | any file as a string | display form of any value |
//! | `JSON` | `.json` | JSON documents | scalars, lists, maps, periods |
//! | `DATASET_GZ` | `.dsc` | dataset containers | datasets, gzip payload |
//! | `DATASET` | `.dsc` | dataset containers | datasets, plain payload |
//!
//! Handlers are listed in registration order, which also breaks fitness ties.
//!
//! ## Dispatch
//!
//! ```text
//! read(path)  ──► read_fitness(path) on every handler ──► max score ──► handler.read
//! write(val)  ──► write_fitness(val) on every handler ──► max score ──► handler.write
//! ```
//!
//! A probe that fails counts as "cannot handle" and dispatch moves on.
//!
//! ## Key Types
//!
//! - [`FormatRegistry`] - Ordered handlers plus the dispatcher
//! - [`FormatHandler`] - One persistence format
//! - [`Config`] - Global and project configuration

mod config;
mod container;
mod format;
mod json;
mod text;

pub use config::{Config, ConfigError, DataSourceConfig, Settings, CONFIG_ENV, PROJECT_DIR};
pub use container::{read_dataset, write_dataset, ContainerEncoding, DatasetFormat};
pub use format::{FormatError, FormatHandler, FormatRegistry, HandlerError, CANNOT_HANDLE};
pub use json::JsonFormat;
pub use text::TextFormat;
