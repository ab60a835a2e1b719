//! Error handling for the qrun CLI.
//!
//! `CliError` is what every command returns; domain errors from the core and
//! browser crates convert into it through `#[from]`. Configuration problems
//! get their own `ConfigError` with a hint the user can act on.

mod miette;

pub use self::miette::cli_error_to_miette;

use qrun_browser::BrowserError;
use qrun_core::{JobError, ProxyError};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (file not found, invalid values, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The job could not be created or updated
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// The resource proxy could not be set up
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// The browser could not be launched or driven
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The run was stopped by Ctrl-C before it completed
    #[error("Run interrupted")]
    Interrupted,
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file not found: {}\n\nHint: Create a qrun.config.json file or fix the --config path", .0.display())]
    NotFound(PathBuf),

    /// A source could not be parsed or does not match the expected shape
    #[error("Failed to load configuration: {0}\n\nHint: Check qrun.config.json syntax, QRUN_* variables and field types")]
    Load(String),

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Load(error.to_string())
    }
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;
