//! Formatting of durations and the end-of-run summary.

use console::Term;
use owo_colors::OwoColorize;
use qrun_core::{JobSummary, PageOutcome, PageRecord};
use std::time::Duration;

/// Format duration in human-readable format.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use qrun_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One-line tally of page outcomes, e.g. `3 passed, 1 failed in 4.20s`.
pub fn summary_line(summary: &JobSummary) -> String {
    let mut parts = vec![format!("{} passed", summary.passed)];
    if summary.failed > 0 {
        parts.push(format!("{} failed", summary.failed));
    }
    if summary.global_timeout > 0 {
        parts.push(format!("{} skipped (timeout)", summary.global_timeout));
    }
    if summary.fail_fast_skipped > 0 {
        parts.push(format!("{} skipped (fail fast)", summary.fail_fast_skipped));
    }
    format!(
        "{} in {}",
        parts.join(", "),
        format_duration(Duration::from_millis(summary.elapsed_ms))
    )
}

fn outcome_marker(outcome: PageOutcome) -> String {
    let colored = console::colors_enabled_stderr();
    match outcome {
        PageOutcome::Passed if colored => "✓".green().to_string(),
        PageOutcome::Failed if colored => "✗".red().to_string(),
        _ if colored => "-".dimmed().to_string(),
        PageOutcome::Passed => "✓".to_string(),
        PageOutcome::Failed => "✗".to_string(),
        _ => "-".to_string(),
    }
}

/// Print the per-page table and totals to stderr.
pub fn print_run_summary(records: &[PageRecord], summary: &JobSummary) {
    let width = usize::from(Term::stderr().size().1).min(80);

    eprintln!("\nTest pages");
    eprintln!("{}", "─".repeat(width));

    for record in records {
        let detail = match (&record.report, &record.error, record.outcome) {
            (Some(report), _, _) => format!("{}/{} passed", report.passed, report.total),
            (None, Some(error), _) => error.clone(),
            (None, None, PageOutcome::GlobalTimeout) => "skipped, global timeout".to_string(),
            (None, None, _) => "skipped, fail fast".to_string(),
        };
        eprintln!("  {} {} ({})", outcome_marker(record.outcome), record.url, detail);
        if let Some(report) = &record.report {
            for test in report.failed_tests() {
                eprintln!("      {}", test.full_name());
                for error in &test.errors {
                    eprintln!("        {error}");
                }
            }
        }
    }

    eprintln!("{}", "─".repeat(width));
    eprintln!("  {}", summary_line(summary));
}
