//! Main CLI application structure

use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

use super::list_cmd::{self, ListArgs};
use super::output::{Output, OutputFormat};
use super::run_cmd::{self, RunArgs};
use crate::exec::{RunError, EXIT_FAILURE};

#[derive(Parser)]
#[command(name = "ect")]
#[command(author, version, about = "Run climate toolbox operations and workflows")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an operation or a workflow file
    Run(RunArgs),

    /// List operations, plugins or data sources
    List(ListArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::List(_) => "list",
        }
    }
}

/// Main entry point for the CLI
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too, with exit code 0
            let _ = e.print();
            return ExitCode::from(e.exit_code().clamp(0, 255) as u8);
        }
    };
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("ect starting");

    let command = cli.command.name();
    let result = match cli.command {
        Commands::Run(args) => run_cmd::run(args, &output),
        Commands::List(args) => list_cmd::run(args, &output),
    };

    match result {
        Ok(()) => {
            output.verbose("Command completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let run_error = e.downcast_ref::<RunError>();
            let usage = run_error
                .filter(|err| err.is_usage())
                .and_then(|_| usage_line(command));
            let joined = run_error.is_some_and(RunError::joins_command);
            output.command_error(command, &format!("{:#}", e), usage.as_deref(), joined);
            ExitCode::from(run_error.map_or(EXIT_FAILURE, RunError::exit_code))
        }
    }
}

/// `usage: ect <cmd> ...` as rendered by clap
fn usage_line(command: &str) -> Option<String> {
    let mut cmd = Cli::command();
    cmd.build();
    let sub = cmd.find_subcommand_mut(command)?;
    let usage = sub.render_usage().to_string();
    let usage = usage.trim();
    Some(match usage.strip_prefix("Usage:") {
        Some(rest) => format!("usage:{}", rest),
        None => usage.to_string(),
    })
}
