//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose | Examples |
//! |---------|---------|----------|
//! | `run` | Run an operation or workflow file | `run time_period period=2010-12`, `run flow.yaml lat=1` |
//! | `list` | Show operations, plugins or data sources | `list`, `list ds --pattern 'sst*'` |
//!
//! ## Exit Codes
//!
//! - `0` - success
//! - `1` - unknown target, bad value, failed operation or write
//! - `2` - malformed command line
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! ect --verbose list pi
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod list_cmd;
mod output;
mod run_cmd;

pub use app::{run, Cli, Commands};
pub use list_cmd::{ListArgs, ListKind};
pub use output::{Output, OutputFormat};
pub use run_cmd::RunArgs;
