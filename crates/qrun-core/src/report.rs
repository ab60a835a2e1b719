//! Report generation collaborator.

use crate::error::CollaboratorError;
use crate::job::Job;
use async_trait::async_trait;

/// Produces the run report from the final job state.
///
/// Implementations are not assumed to be idempotent: the scheduler calls
/// `generate` exactly once per run, and never when no test page was found.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generates the report for `job`.
    async fn generate(&self, job: &Job) -> Result<(), CollaboratorError>;
}
