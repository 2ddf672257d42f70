//! `ect run`

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::output::Output;
use crate::exec::{Resolver, RunRequest};
use crate::runtime;
use crate::storage::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Report progress while running
    #[arg(long, short = 'm')]
    pub monitor: bool,

    /// Write the output to FILE, choosing the format automatically
    #[arg(long, short = 'w', value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Format name to use with --write
    #[arg(long, value_name = "NAME", requires = "write")]
    pub write_format: Option<String>,

    /// Operation name or workflow file
    #[arg(value_name = "OP")]
    pub target: Option<String>,

    /// Arguments for the operation or workflow
    #[arg(value_name = "NAME=VALUE")]
    pub args: Vec<String>,
}

pub fn run(args: RunArgs, output: &Output) -> Result<()> {
    let config = Config::load()?;
    let runtime = runtime::global()?;
    let monitor = args.monitor || config.monitor_by_default();

    output.verbose_ctx(
        "run",
        &format!(
            "Target: {:?}, {} argument(s), monitor={}",
            args.target,
            args.args.len(),
            monitor
        ),
    );

    let request = RunRequest {
        target: args.target,
        args: args.args,
        monitor,
    };

    // Keep stdout machine-readable in JSON mode
    let mut report: Box<dyn Write> = if output.is_json() {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    let outcome = Resolver::new(runtime).run(&request, &mut report)?;
    output.verbose_ctx("run", "Execution finished");

    if !output.is_json() {
        outcome.report(&mut report)?;
    }
    report.flush()?;

    let written = match &args.write {
        Some(dest) => {
            let format = outcome.persist(&runtime.formats, dest, args.write_format.as_deref())?;
            output.verbose_ctx("run", &format!("Wrote {} using format {}", dest.display(), format));
            Some((dest, format))
        }
        None => None,
    };

    if output.is_json() {
        let mut data = outcome.to_json();
        if let (Some(map), Some((dest, format))) = (data.as_object_mut(), &written) {
            map.insert("written".into(), serde_json::json!({
                "path": dest.display().to_string(),
                "format": format,
            }));
        }
        output.data(&data);
    } else if let Some((dest, format)) = &written {
        output.success(&format!("Output written to {} ({})", dest.display(), format));
    }

    Ok(())
}
