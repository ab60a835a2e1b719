//! Miette diagnostic conversion for CLI errors.

use crate::error::{CliError, ConfigError};
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Browser(e) => miette::miette!(
            help = "qrun needs Chrome or Chromium; install it or pass --chrome <path>",
            "{}",
            e
        ),
        _ => miette::miette!("{}", err),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::InvalidValue { field, value, hint } => miette::miette!(
            help = hint,
            "Invalid value for '{}': {}",
            field,
            value
        ),
        other => miette::miette!("{}", other),
    }
}
