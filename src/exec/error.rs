//! Errors raised while resolving and running a target

use thiserror::Error;

use super::pipeline::PipelineError;
use crate::storage::FormatError;

/// Process exit code for success
pub const EXIT_OK: u8 = 0;

/// Process exit code for resolution and runtime failures
pub const EXIT_FAILURE: u8 = 1;

/// Process exit code for malformed command lines
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("requires OP argument")]
    MissingTarget,

    #[error("argument '{0}' is not of the form NAME=VALUE")]
    MalformedArgument(String),

    #[error("keyword '{0}' is not a valid identifier")]
    InvalidArgumentName(String),

    #[error("missing value for required input(s) of '{target}': {}", .names.join(", "))]
    MissingArguments { target: String, names: Vec<String> },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("'{target}' has no input named '{name}'")]
    UnknownInput { target: String, name: String },

    #[error("invalid value for '{name}': {detail}")]
    InvalidArgumentValue { name: String, detail: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0:#}")]
    Execution(anyhow::Error),

    #[error(transparent)]
    Persist(#[from] FormatError),

    #[error("cannot write report")]
    Report(#[from] std::io::Error),
}

impl RunError {
    /// True for command-line mistakes detected before anything runs
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            RunError::MissingTarget
                | RunError::MalformedArgument(_)
                | RunError::InvalidArgumentName(_)
                | RunError::MissingArguments { .. }
        )
    }

    /// True when the message continues the `command '<cmd>'` prefix directly
    pub fn joins_command(&self) -> bool {
        matches!(self, RunError::MissingTarget)
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_usage() {
            EXIT_USAGE
        } else {
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(RunError::MissingTarget.exit_code(), EXIT_USAGE);
        assert_eq!(RunError::InvalidArgumentName("l*t".into()).exit_code(), EXIT_USAGE);
        assert_eq!(
            RunError::MissingArguments {
                target: "op".into(),
                names: vec!["a".into()]
            }
            .exit_code(),
            EXIT_USAGE
        );
    }

    #[test]
    fn runtime_errors_exit_with_one() {
        assert_eq!(RunError::UnknownOperation("x".into()).exit_code(), EXIT_FAILURE);
        assert_eq!(
            RunError::InvalidArgumentValue {
                name: "lat".into(),
                detail: "expected float".into()
            }
            .exit_code(),
            EXIT_FAILURE
        );
        assert_eq!(RunError::Execution(anyhow::anyhow!("boom")).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn only_missing_target_joins_the_command() {
        assert!(RunError::MissingTarget.joins_command());
        let execution = RunError::Execution(anyhow::anyhow!("requires a dataset"));
        assert!(!execution.joins_command());
    }

    #[test]
    fn messages() {
        assert_eq!(
            RunError::UnknownOperation("pipapo".into()).to_string(),
            "unknown operation 'pipapo'"
        );
        assert_eq!(
            RunError::InvalidArgumentName("l*t".into()).to_string(),
            "keyword 'l*t' is not a valid identifier"
        );
        assert_eq!(
            RunError::MissingArguments {
                target: "subset".into(),
                names: vec!["lat".into(), "lon".into()]
            }
            .to_string(),
            "missing value for required input(s) of 'subset': lat, lon"
        );
    }
}
