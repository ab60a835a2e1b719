//! JSON run report.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qrun_core::{CollaboratorError, Job, JobSummary, PageRecord, ReportGenerator};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the report file inside the report directory.
pub const REPORT_FILE: &str = "report.json";

/// Serialized shape of `report.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// When the job started
    pub start: DateTime<Utc>,
    /// Wall-clock duration of the job
    pub duration_ms: u64,
    /// Upstream origin resources were fetched from
    pub ui5: String,
    /// Aggregated counters
    pub summary: JobSummary,
    /// One record per discovered page, in discovery order
    pub pages: Vec<PageRecord>,
}

impl Report {
    /// Snapshots the job.
    pub fn from_job(job: &Job) -> Self {
        let summary = job.summary();
        Self {
            start: DateTime::<Utc>::from(job.started_at()),
            duration_ms: summary.elapsed_ms,
            ui5: job.config().ui5.clone(),
            summary,
            pages: job.page_records(),
        }
    }
}

/// Writes `report.json` into the report directory.
pub struct JsonReport {
    dir: PathBuf,
}

impl JsonReport {
    /// Creates a generator writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the report file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }
}

#[async_trait]
impl ReportGenerator for JsonReport {
    async fn generate(&self, job: &Job) -> Result<(), CollaboratorError> {
        let report = Report::from_job(job);
        let json = serde_json::to_string_pretty(&report)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path();
        tokio::fs::write(&path, json).await?;

        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

/// Empties `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be removed or created.
pub async fn recreate_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "Removed previous report"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}
