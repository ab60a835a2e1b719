//! qrun - run the QUnit test pages of a UI5 application in headless Chrome.
//!
//! Parses the command line, initializes logging and colors, runs the job and
//! maps its outcome to the process exit code.

use clap::Parser;
use qrun_cli::{cli, error, logger, runner, ui};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let outcome = runner::run(&args)
        .await
        .map_err(error::cli_error_to_miette)?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
