//! qrun CLI - serve a UI5 application and run its QUnit test pages.
//!
//! The binary glues three pieces together:
//!
//! - [`server`] - axum server for the webapp, with library resources going
//!   through the caching [`qrun_core::ResourceProxy`]
//! - [`qrun_browser`] - headless Chrome that discovers and executes the pages
//! - [`qrun_core::Scheduler`] - bounded parallelism, timeouts and fail-fast
//!
//! Supporting modules:
//!
//! - [`cli`] - command-line flags
//! - [`config`] - figment loading (`qrun.config.json`, `QRUN_*`, flags)
//! - [`error`] - error types with actionable messages
//! - [`logger`] - structured logging with tracing
//! - [`report`] - `report.json` generation
//! - [`ui`] - terminal messages and the end-of-run summary
//!
//! # Example
//!
//! ```no_run
//! use qrun_cli::{cli::Cli, runner};
//!
//! # async fn demo() -> qrun_cli::Result<()> {
//! let outcome = runner::run(&Cli::default()).await?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod report;
pub mod runner;
pub mod server;
pub mod ui;

pub use error::{CliError, ConfigError, Result};
