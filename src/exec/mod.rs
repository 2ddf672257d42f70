//! Execution layer
//!
//! # Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `binding` | `key=value` parsing, identifier checks, type coercion |
//! | `pipeline` | JSON/YAML pipeline files and their step graph |
//! | `resolver` | Target resolution and the `run` flow |
//! | `error` | [`RunError`] and exit codes |

mod binding;
mod error;
mod pipeline;
mod resolver;

pub use binding::{bind, coerce_text, coerce_value, is_identifier, parse_args, RawArg};
pub use error::{RunError, EXIT_FAILURE, EXIT_OK, EXIT_USAGE};
pub use pipeline::{InputDecl, Pipeline, PipelineError, Step, StepInput, RETURN_PORT};
pub use resolver::{Resolver, RunOutcome, RunRequest, Target};
