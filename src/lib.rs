//! ect - run climate toolbox operations and workflows from the command line
//!
//! The crate is layered leaves first: `domain` holds values, periods and
//! progress monitors; `storage` the format handlers, their dispatcher and
//! configuration; `ops` the operation registry and built-in operations;
//! `exec` argument binding, pipelines and the execution resolver; `cli` the
//! `ect` command tree.

pub mod cli;
pub mod domain;
pub mod exec;
pub mod ops;
pub mod plugin;
pub mod runtime;
pub mod storage;

pub use domain::{parse_time_period, DateRange, Value};
pub use exec::{Resolver, RunError, RunRequest};
pub use storage::{FormatHandler, FormatRegistry};
