//! Terminal output for the person running the tests.
//!
//! Logs go through `tracing`; this module prints the few lines meant to be
//! read at a glance: where the server listens, and the final summary.

mod format;
mod messages;

pub use format::{format_duration, print_run_summary, summary_line};
pub use messages::{error, info, success, warning};

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
}

/// Applies color support for the whole process.
///
/// `owo-colors` styles unconditionally, so `console`'s global switch is the
/// one consulted before printing styled text.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && crate::logger::should_use_colors();
    console::set_colors_enabled_stderr(enabled);
}
