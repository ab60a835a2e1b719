//! Run-scoped job state shared by the proxy, the scheduler and collaborators.
//!
//! One `Job` exists per process. It is created from a [`JobConfig`], shared
//! through an `Arc`, and mutated during discovery and execution. Each shared
//! field has exactly one synchronization primitive: the page counters and the
//! failed flag are atomics, the status and page records sit behind
//! `parking_lot` locks, and the test page list is written once.

use crate::error::JobError;
use crate::page::{PageOutcome, PageRecord};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Default upstream origin for library resources.
pub const DEFAULT_UI5_ORIGIN: &str = "https://ui5.sap.com";

/// Options a job is built from.
///
/// Durations are expressed in milliseconds; `0` means "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Project directory; relative paths below are resolved against it
    pub cwd: PathBuf,

    /// Directory of the application under test
    pub webapp: PathBuf,

    /// Testsuite page, relative to the served root
    pub testsuite: String,

    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Cache directory, `None` disables caching
    pub cache: Option<PathBuf>,

    /// Local library root that overrides `/resources/` requests
    pub libs: Option<PathBuf>,

    /// Upstream origin serving library resources, optionally version-suffixed
    pub ui5: String,

    /// Maximum number of test pages executing at once
    pub parallel: usize,

    /// Skip pages claimed after a failure
    pub fail_fast: bool,

    /// Global timeout in milliseconds
    pub global_timeout: u64,

    /// Per-page timeout in milliseconds
    pub page_timeout: u64,

    /// Directory receiving the report, recreated before a run
    pub report_dir: PathBuf,

    /// Log every served HTTP request
    pub log_server: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            cwd: PathBuf::from("."),
            webapp: PathBuf::from("webapp"),
            testsuite: "test/testsuite.qunit.html".to_string(),
            port: 0,
            cache: Some(PathBuf::from(".ui5")),
            libs: None,
            ui5: DEFAULT_UI5_ORIGIN.to_string(),
            parallel: 2,
            fail_fast: false,
            global_timeout: 0,
            page_timeout: 0,
            report_dir: PathBuf::from("report"),
            log_server: false,
        }
    }
}

impl JobConfig {
    /// Resolves a configured path against `cwd`.
    #[must_use]
    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Global timeout as a duration, if any.
    #[must_use]
    pub fn global_timeout(&self) -> Option<Duration> {
        (self.global_timeout > 0).then(|| Duration::from_millis(self.global_timeout))
    }

    /// Per-page timeout as a duration, if any.
    #[must_use]
    pub fn page_timeout(&self) -> Option<Duration> {
        (self.page_timeout > 0).then(|| Duration::from_millis(self.page_timeout))
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Job created, nothing served yet
    Starting,
    /// HTTP server is accepting requests
    Serving,
    /// The testsuite page is being loaded to list test pages
    ExtractingTestPages,
    /// Test pages are being executed
    ExecutingTestPages,
    /// The report is being generated
    GeneratingReport,
    /// Run finished
    Done,
}

/// Aggregated view of a job, used for status endpoints and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Current status
    pub status: JobStatus,
    /// Number of discovered test pages
    pub total: usize,
    /// Pages claimed by a lane
    pub started: usize,
    /// Pages that reached a terminal outcome
    pub completed: usize,
    /// Pages that passed
    pub passed: usize,
    /// Pages that failed
    pub failed: usize,
    /// Pages skipped by the global timeout
    pub global_timeout: usize,
    /// Pages skipped by fail-fast
    pub fail_fast_skipped: usize,
    /// Whether the job as a whole failed
    pub job_failed: bool,
    /// Milliseconds since the job started
    pub elapsed_ms: u64,
}

/// Shared record of one run.
#[derive(Debug)]
pub struct Job {
    config: JobConfig,
    port: AtomicU16,
    status: RwLock<JobStatus>,
    start: RwLock<(Instant, SystemTime)>,
    test_page_urls: OnceLock<Vec<String>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicBool,
    records: Mutex<BTreeMap<usize, PageRecord>>,
}

impl Job {
    /// Creates a job; the global timeout clock starts now and is restarted
    /// by [`Job::restart_clock`] when test page discovery begins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `parallel` is zero.
    pub fn new(config: JobConfig) -> Result<Self, JobError> {
        if config.parallel == 0 {
            return Err(JobError::InvalidConfig(
                "parallel must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            port: AtomicU16::new(config.port),
            config,
            status: RwLock::new(JobStatus::Starting),
            start: RwLock::new((Instant::now(), SystemTime::now())),
            test_page_urls: OnceLock::new(),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            records: Mutex::new(BTreeMap::new()),
        })
    }

    /// Returns the configuration this job was built from.
    #[must_use]
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Port the server actually listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Acquire)
    }

    /// Records the bound port (relevant when port 0 was requested).
    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::Release);
    }

    /// Base URL of the local server.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port())
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        *self.status.read()
    }

    /// Moves the job to a new lifecycle status.
    pub fn set_status(&self, status: JobStatus) {
        *self.status.write() = status;
    }

    /// Restarts the job clock; elapsed time and the global deadline are
    /// measured from here on.
    pub fn restart_clock(&self) {
        *self.start.write() = (Instant::now(), SystemTime::now());
    }

    /// Wall-clock time the job clock started.
    #[must_use]
    pub fn started_at(&self) -> SystemTime {
        self.start.read().1
    }

    /// Time elapsed since the job clock started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.read().0.elapsed()
    }

    /// Absolute deadline derived from the global timeout.
    #[must_use]
    pub fn timeout_deadline(&self) -> Option<Instant> {
        let start = self.start.read().0;
        self.config.global_timeout().map(|timeout| start + timeout)
    }

    /// Returns true once the global deadline has passed.
    #[must_use]
    pub fn globally_timed_out(&self) -> bool {
        self.timeout_deadline()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Publishes the discovered test pages.
    ///
    /// # Errors
    ///
    /// Returns `TestPagesAlreadySet` if discovery already published a list.
    pub fn set_test_page_urls(&self, urls: Vec<String>) -> Result<(), JobError> {
        self.test_page_urls
            .set(urls)
            .map_err(|_| JobError::TestPagesAlreadySet)
    }

    /// Discovered test pages, empty until discovery completed.
    #[must_use]
    pub fn test_page_urls(&self) -> &[String] {
        self.test_page_urls.get().map_or(&[], Vec::as_slice)
    }

    /// Number of pages claimed so far.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    /// Number of pages that reached a terminal outcome.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Returns true when every discovered page completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed() == self.test_page_urls().len()
    }

    /// Claims the next page index in discovery order.
    ///
    /// Returns `None` once every page has been claimed. The read and the
    /// increment form a single atomic step, so two lanes never claim the
    /// same index.
    pub(crate) fn claim_next(&self) -> Option<usize> {
        let total = self.test_page_urls().len();
        self.started
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |started| {
                (started < total).then_some(started + 1)
            })
            .ok()
    }

    /// Marks one claimed page as completed.
    ///
    /// Returns true for exactly one caller: the one whose increment made
    /// `completed` reach the page count.
    pub(crate) fn complete_one(&self) -> bool {
        let total = self.test_page_urls().len();
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(completed <= self.started());
        completed == total
    }

    /// Flags the job as failed.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// Whether any page (or the run itself) failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Stores the terminal record of the page at `index`.
    pub fn record_page(&self, index: usize, record: PageRecord) {
        self.records.lock().insert(index, record);
    }

    /// Page records in discovery order.
    #[must_use]
    pub fn page_records(&self) -> Vec<PageRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Builds an aggregated snapshot of the job.
    #[must_use]
    pub fn summary(&self) -> JobSummary {
        let records = self.records.lock();
        let count = |outcome: PageOutcome| records.values().filter(|r| r.outcome == outcome).count();

        JobSummary {
            status: self.status(),
            total: self.test_page_urls().len(),
            started: self.started(),
            completed: self.completed(),
            passed: count(PageOutcome::Passed),
            failed: count(PageOutcome::Failed),
            global_timeout: count(PageOutcome::GlobalTimeout),
            fail_fast_skipped: count(PageOutcome::FailFastSkipped),
            job_failed: self.failed(),
            elapsed_ms: u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_pages(count: usize) -> Job {
        let job = Job::new(JobConfig::default()).unwrap();
        let urls = (0..count).map(|i| format!("http://localhost/test{i}.html")).collect();
        job.set_test_page_urls(urls).unwrap();
        job
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let config = JobConfig {
            parallel: 0,
            ..JobConfig::default()
        };
        assert!(matches!(Job::new(config), Err(JobError::InvalidConfig(_))));
    }

    #[test]
    fn test_pages_can_only_be_set_once() {
        let job = job_with_pages(2);
        assert_eq!(job.test_page_urls().len(), 2);
        assert!(matches!(
            job.set_test_page_urls(vec![]),
            Err(JobError::TestPagesAlreadySet)
        ));
    }

    #[test]
    fn claims_follow_discovery_order_and_stop_at_total() {
        let job = job_with_pages(3);
        assert_eq!(job.claim_next(), Some(0));
        assert_eq!(job.claim_next(), Some(1));
        assert_eq!(job.claim_next(), Some(2));
        assert_eq!(job.claim_next(), None);
        assert_eq!(job.started(), 3);
    }

    #[test]
    fn only_the_last_completion_reports_done() {
        let job = job_with_pages(3);
        for _ in 0..3 {
            job.claim_next();
        }
        assert!(!job.complete_one());
        assert!(!job.complete_one());
        assert!(job.complete_one());
        assert!(job.is_complete());
    }

    #[test]
    fn no_deadline_without_global_timeout() {
        let job = job_with_pages(0);
        assert!(job.timeout_deadline().is_none());
        assert!(!job.globally_timed_out());
    }

    #[test]
    fn elapsed_global_timeout_is_detected() {
        let config = JobConfig {
            global_timeout: 1,
            ..JobConfig::default()
        };
        let job = Job::new(config).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(job.globally_timed_out());
    }

    #[test]
    fn restarting_the_clock_moves_the_deadline() {
        let config = JobConfig {
            global_timeout: 50,
            ..JobConfig::default()
        };
        let job = Job::new(config).unwrap();
        let first = job.timeout_deadline().unwrap();
        let created_at = job.started_at();

        std::thread::sleep(Duration::from_millis(60));
        assert!(job.globally_timed_out());

        job.restart_clock();
        assert!(!job.globally_timed_out());
        assert!(job.timeout_deadline().unwrap() >= first + Duration::from_millis(60));
        assert!(job.started_at() > created_at);
        assert!(job.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn summary_counts_outcomes() {
        let job = job_with_pages(2);
        job.record_page(
            1,
            PageRecord {
                url: "b".to_string(),
                outcome: PageOutcome::FailFastSkipped,
                report: None,
                error: None,
            },
        );
        job.record_page(
            0,
            PageRecord {
                url: "a".to_string(),
                outcome: PageOutcome::Failed,
                report: None,
                error: Some("boom".to_string()),
            },
        );

        let summary = job.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.fail_fast_skipped, 1);

        let records = job.page_records();
        assert_eq!(records[0].url, "a");
        assert_eq!(records[1].url, "b");
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let config = JobConfig {
            cwd: PathBuf::from("/project"),
            ..JobConfig::default()
        };
        assert_eq!(
            config.resolve(std::path::Path::new("webapp")),
            PathBuf::from("/project/webapp")
        );
        assert_eq!(
            config.resolve(std::path::Path::new("/abs")),
            PathBuf::from("/abs")
        );
    }

    #[test]
    fn config_serializes_camel_case() {
        let json = serde_json::to_value(JobConfig::default()).unwrap();
        assert!(json.get("failFast").is_some());
        assert!(json.get("reportDir").is_some());
        assert!(json.get("fail_fast").is_none());
    }
}
