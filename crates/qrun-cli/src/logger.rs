//! Logging infrastructure for the qrun CLI.
//!
//! Structured logging through `tracing`. Every crate of the workspace logs
//! under its own target; the filter below decides which of them are shown.
//!
//! # Example
//!
//! ```rust,no_run
//! use qrun_cli::logger::init_logger;
//! use tracing::info;
//!
//! init_logger(false, false, false);
//! info!("Executing test pages");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TARGETS: &[&str] = &["qrun_core", "qrun_browser", "qrun_cli", "tower_http"];

/// Builds the filter directive for a level applied to every qrun target.
fn directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Selects the log filter.
///
/// The logging level is determined in this order:
/// 1. `--verbose` flag: DEBUG for qrun crates
/// 2. `--quiet` flag: ERROR only
/// 3. `RUST_LOG` environment variable: custom filter
/// 4. Default: INFO for qrun crates
pub fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives("debug"))
    } else if quiet {
        EnvFilter::new(directives("error"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    }
}

/// Initialize the tracing subscriber.
///
/// Call once, before anything logs. A second call panics, as with any
/// global subscriber.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    tracing_subscriber::registry()
        .with(filter(verbose, quiet))
        .with(fmt_layer)
        .init();
}

/// Check if colored output should be enabled.
///
/// - `NO_COLOR`: If set, disables colors
/// - `FORCE_COLOR`: If set, forces colors even in non-TTY
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_directives_cover_every_crate() {
        let info = directives("info");
        assert_eq!(info, "qrun_core=info,qrun_browser=info,qrun_cli=info,tower_http=info");
    }

    #[test]
    fn test_verbose_wins_over_rust_log() {
        let filter = filter(true, false).to_string();
        assert!(filter.contains("qrun_core=debug"));
    }

    #[test]
    fn test_quiet_filter() {
        let filter = filter(false, true).to_string();
        assert!(filter.contains("qrun_cli=error"));
    }

    #[test]
    #[serial]
    fn test_should_use_colors_respects_env() {
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(!should_use_colors(), "NO_COLOR takes precedence");

        unsafe {
            std::env::remove_var("NO_COLOR");
        }
        assert!(should_use_colors());

        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }
}
