//! Command-line interface definition.
//!
//! Every job option can also come from `qrun.config.json` or a `QRUN_*`
//! environment variable; flags given here win over both.

mod validation;

use clap::Parser;
use std::path::PathBuf;

pub use validation::parse_duration_ms;

/// qrun - run the QUnit test pages of a UI5 application in headless Chrome
#[derive(Parser, Debug, Default)]
#[command(
    name = "qrun",
    version,
    about = "Run the QUnit test pages of a UI5 application in headless Chrome",
    long_about = "qrun serves a UI5 application, proxies and caches the UI5 library resources it\n\
                  loads, discovers the test pages listed by its test suite and executes them in\n\
                  headless Chrome with bounded parallelism."
)]
pub struct Cli {
    /// Configuration file (default: qrun.config.json in the working directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project directory; other paths are resolved against it
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Application directory to serve
    #[arg(long, value_name = "DIR")]
    pub webapp: Option<PathBuf>,

    /// Test suite page, relative to the served root
    #[arg(long, value_name = "PATH")]
    pub testsuite: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Cache directory for UI5 resources
    #[arg(long, value_name = "DIR", conflicts_with = "no_cache")]
    pub cache: Option<PathBuf>,

    /// Always fetch UI5 resources from the origin
    #[arg(long)]
    pub no_cache: bool,

    /// Local library build overriding /resources/ requests
    #[arg(long, value_name = "DIR")]
    pub libs: Option<PathBuf>,

    /// UI5 origin, optionally with a version (e.g. https://ui5.sap.com/1.120.0)
    #[arg(long, value_name = "URL")]
    pub ui5: Option<String>,

    /// Maximum number of test pages running at once
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Skip remaining test pages once one fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Stop starting test pages after this long (e.g. 500, 30s, 10m)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub global_timeout: Option<u64>,

    /// Give up on a test page after this long (e.g. 500, 30s, 10m)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub page_timeout: Option<u64>,

    /// Report directory, emptied before the run
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Log every HTTP request served
    #[arg(long)]
    pub log_server: bool,

    /// Chrome executable (default: auto-detect)
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
