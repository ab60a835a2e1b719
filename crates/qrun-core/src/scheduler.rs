//! Bounded-concurrency test page scheduler.
//!
//! `min(parallel, pages)` lanes run concurrently. Each lane claims the next
//! page in discovery order, runs it (or records why it was skipped), marks
//! it completed and loops. The lane whose completion brings the count to
//! the total is the single point that generates the report.
//!
//! Timeout and fail-fast are checked at every claim. A page that is already
//! executing is never interrupted.

use crate::job::{Job, JobStatus};
use crate::page::{PageExecutor, PageOutcome, PageRecord};
use crate::report::ReportGenerator;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Discovery produced no test page; nothing ran and no report was made
    NoTestPagesFound,
    /// Every page reached a terminal outcome and the report was generated
    Completed {
        /// Whether any page failed (or the report could not be generated)
        failed: bool,
    },
}

impl RunOutcome {
    /// Returns true if the run should be considered successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { failed: false })
    }
}

/// Drives discovered test pages through a [`PageExecutor`].
pub struct Scheduler {
    executor: Arc<dyn PageExecutor>,
    reporter: Arc<dyn ReportGenerator>,
}

impl Scheduler {
    /// Creates a scheduler from its collaborators.
    pub fn new(executor: Arc<dyn PageExecutor>, reporter: Arc<dyn ReportGenerator>) -> Self {
        Self { executor, reporter }
    }

    /// Runs every discovered page of `job` and generates the report once.
    ///
    /// Resolves immediately with [`RunOutcome::NoTestPagesFound`] when the
    /// page list is empty.
    pub async fn run(&self, job: &Job) -> RunOutcome {
        let total = job.test_page_urls().len();
        if total == 0 {
            error!("No test page found");
            job.mark_failed();
            job.set_status(JobStatus::Done);
            return RunOutcome::NoTestPagesFound;
        }

        let lanes = job.config().parallel.min(total);
        info!(pages = total, lanes, "Executing test pages");
        job.set_status(JobStatus::ExecutingTestPages);

        join_all((0..lanes).map(|lane| self.lane(job, lane))).await;

        job.set_status(JobStatus::Done);
        RunOutcome::Completed {
            failed: job.failed(),
        }
    }

    async fn lane(&self, job: &Job, lane: usize) {
        while let Some(index) = job.claim_next() {
            let url = &job.test_page_urls()[index];
            debug!(lane, index, url = %url, "Claimed test page");

            let record = self.run_page(job, url).await;
            job.record_page(index, record);

            if job.complete_one() {
                self.finish(job).await;
            }
        }
        debug!(lane, "Lane finished");
    }

    async fn run_page(&self, job: &Job, url: &str) -> PageRecord {
        let skipped = |outcome| PageRecord {
            url: url.to_string(),
            outcome,
            report: None,
            error: None,
        };

        if job.globally_timed_out() {
            warn!(url, "Global timeout reached, skipping test page");
            return skipped(PageOutcome::GlobalTimeout);
        }

        if job.config().fail_fast && job.failed() {
            warn!(url, "Fail fast triggered, skipping test page");
            return skipped(PageOutcome::FailFastSkipped);
        }

        match self.executor.execute(url).await {
            Ok(report) if report.is_success() => {
                info!(url, passed = report.passed, total = report.total, "Test page passed");
                PageRecord {
                    url: url.to_string(),
                    outcome: PageOutcome::Passed,
                    report: Some(report),
                    error: None,
                }
            }
            Ok(report) => {
                job.mark_failed();
                warn!(url, failed = report.failed, total = report.total, "Test page failed");
                for test in report.failed_tests() {
                    warn!(url, test = %test.full_name(), "Failed test");
                }
                PageRecord {
                    url: url.to_string(),
                    outcome: PageOutcome::Failed,
                    report: Some(report),
                    error: None,
                }
            }
            Err(e) => {
                job.mark_failed();
                error!(url, error = %e, "Test page could not be executed");
                PageRecord {
                    url: url.to_string(),
                    outcome: PageOutcome::Failed,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Completion point, reached by exactly one lane.
    async fn finish(&self, job: &Job) {
        job.set_status(JobStatus::GeneratingReport);
        if let Err(e) = self.reporter.generate(job).await {
            error!(error = %e, "Report generation failed");
            job.mark_failed();
        }
        info!(summary = ?job.summary(), "Test pages completed");
    }
}
