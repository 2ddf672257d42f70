//! ect - run climate toolbox operations and workflows

use std::process::ExitCode;

fn main() -> ExitCode {
    ect_cli::cli::run()
}
