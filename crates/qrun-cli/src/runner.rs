//! Run orchestration: serve, discover, schedule.
//!
//! One run owns one [`Job`], one [`ResourceProxy`], one HTTP server and one
//! browser. The server stays up for the whole run because test pages keep
//! requesting library resources while they execute.

use crate::cli::Cli;
use crate::config;
use crate::error::{CliError, Result};
use crate::report::{self, JsonReport};
use crate::server;
use crate::ui;
use qrun_browser::{
    BrowserExecutor, TestBrowser, TestBrowserConfig, WaitConfig, discover_test_pages,
};
use qrun_core::{Job, JobConfig, JobStatus, ResourceProxy, RunOutcome, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Loads the configuration from every source and runs the job.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the server cannot
/// bind, the browser cannot be launched or the test suite cannot be read.
/// Failing test pages are not errors; they are reported in the outcome.
pub async fn run(cli: &Cli) -> Result<RunOutcome> {
    let config = config::load(cli)?;
    execute(config, browser_config(cli)).await
}

/// Browser settings taken from the command line.
pub fn browser_config(cli: &Cli) -> TestBrowserConfig {
    let mut config = TestBrowserConfig::new();
    if cli.headed {
        config = config.visible();
    }
    if let Some(chrome) = &cli.chrome {
        config = config.with_chrome_path(chrome);
    }
    config
}

/// Runs a validated job to completion.
///
/// # Errors
///
/// See [`run`].
pub async fn execute(config: JobConfig, browser: TestBrowserConfig) -> Result<RunOutcome> {
    let job = Arc::new(Job::new(config)?);
    let proxy = Arc::new(ResourceProxy::from_job(job.config())?);

    let report_dir = job.config().resolve(&job.config().report_dir);
    report::recreate_dir(&report_dir).await?;

    let server = server::start(job.clone(), proxy.clone()).await?;
    ui::info(&format!(
        "Serving {} at {}",
        job.config().resolve(&job.config().webapp).display(),
        job.base_url()
    ));

    let result = drive(&job, browser, report_dir).await;

    let stopped = server.stop().await;
    let stats = proxy.stats();
    info!(
        cache_hits = stats.cache_hits,
        override_hits = stats.override_hits,
        coalesced = stats.coalesced,
        upstream_fetches = stats.upstream_fetches,
        failures = stats.failures,
        uncachable_rejections = stats.uncachable_rejections,
        "Resource proxy statistics"
    );

    let outcome = result?;
    stopped?;

    match outcome {
        RunOutcome::NoTestPagesFound => ui::error("No test page found"),
        RunOutcome::Completed { failed } => {
            let summary = job.summary();
            ui::print_run_summary(&job.page_records(), &summary);
            if failed {
                ui::error(&ui::summary_line(&summary));
            } else {
                ui::success(&ui::summary_line(&summary));
            }
        }
    }

    Ok(outcome)
}

/// Launches the browser, discovers test pages and schedules them.
async fn drive(job: &Job, config: TestBrowserConfig, report_dir: PathBuf) -> Result<RunOutcome> {
    let browser = Arc::new(TestBrowser::launch(config).await?);

    let result = discover_and_schedule(job, &browser, report_dir).await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
    result
}

async fn discover_and_schedule(
    job: &Job,
    browser: &Arc<TestBrowser>,
    report_dir: PathBuf,
) -> Result<RunOutcome> {
    job.set_status(JobStatus::ExtractingTestPages);
    job.restart_clock();

    let suite_url = format!(
        "{}/{}",
        job.base_url(),
        job.config().testsuite.trim_start_matches('/')
    );
    let discovery_wait = job
        .config()
        .page_timeout()
        .map_or_else(WaitConfig::default, WaitConfig::with_timeout);
    let pages = discover_test_pages(browser, &suite_url, discovery_wait).await?;
    for page in &pages {
        debug!(url = %page, "Discovered test page");
    }
    job.set_test_page_urls(pages)?;

    let executor = Arc::new(BrowserExecutor::new(
        browser.clone(),
        job.config().page_timeout(),
    ));
    let scheduler = Scheduler::new(executor, Arc::new(JsonReport::new(report_dir)));

    tokio::select! {
        outcome = scheduler.run(job) => Ok(outcome),
        interrupted = tokio::signal::ctrl_c() => {
            interrupted?;
            warn!("Interrupted, stopping test pages");
            Err(CliError::Interrupted)
        }
    }
}
