//! Error types for the cache proxy and the test page scheduler.
//!
//! Proxy failures never leave the proxy: they are converted into a
//! not-found decision and logged. Scheduler conditions are recorded into the
//! job state. The types below exist so that collaborators can report what
//! went wrong with enough context to log it.

use thiserror::Error;

/// Errors raised while fetching or caching an upstream resource.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The upstream origin answered with a non-success status.
    #[error("upstream returned status {status} for '{path}'")]
    UpstreamStatus {
        /// Resource path that was requested
        path: String,
        /// HTTP status code returned by the origin
        status: u16,
    },

    /// The upstream request failed before or while streaming the body.
    #[error("upstream fetch of '{path}' failed: {reason}")]
    UpstreamFetch {
        /// Resource path that was requested
        path: String,
        /// Human-readable failure reason
        reason: String,
    },

    /// Writing the cache file failed.
    #[error("failed to write cache file for '{path}': {source}")]
    CacheWrite {
        /// Resource path being cached
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The configured upstream origin is not a usable URL.
    #[error("invalid upstream origin '{url}': {reason}")]
    InvalidOrigin {
        /// The rejected origin URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Wraps errors from the HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised by job state transitions.
#[derive(Debug, Error)]
pub enum JobError {
    /// Discovery tried to publish the test page list a second time.
    #[error("test page URLs were already discovered for this job")]
    TestPagesAlreadySet,

    /// A configuration value cannot be used to build a job.
    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),
}

/// Error returned by a page execution or report generation collaborator.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// A specialized Result type for proxy operations.
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;
