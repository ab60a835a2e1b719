//! # qrun-core
//!
//! The concurrency core of the qrun test runner: a caching proxy for the
//! library resource tree and a bounded scheduler for browser-hosted test
//! pages, sharing one run-scoped [`Job`].
//!
//! ## Architecture
//!
//! - **Job**: shared record of a run (configuration, status, counters, page list)
//! - **ResourceProxy**: cache-or-fetch decisions with request coalescing and
//!   negative caching
//! - **Scheduler**: self-replenishing lanes that execute test pages under
//!   timeout and fail-fast rules, then generate the report exactly once
//!
//! The HTTP server, the browser driver and the report format live in other
//! crates and plug in through [`Upstream`], [`PageExecutor`] and
//! [`ReportGenerator`].
//!
//! ## Example
//!
//! ```ignore
//! use qrun_core::{Job, JobConfig, Scheduler};
//! use std::sync::Arc;
//!
//! let job = Job::new(JobConfig::default())?;
//! job.set_test_page_urls(discovered)?;
//! let outcome = Scheduler::new(executor, reporter).run(&job).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod job;
pub mod page;
pub mod proxy;
pub mod report;
pub mod scheduler;

pub use error::{CollaboratorError, JobError, ProxyError};
pub use job::{Job, JobConfig, JobStatus, JobSummary};
pub use page::{PageExecutor, PageOutcome, PageRecord, TestPageReport, TestResult};
pub use proxy::upstream::{HttpUpstream, Upstream, UpstreamResponse};
pub use proxy::{Decision, ProxyConfig, ResourceProxy, StreamedResource};
pub use report::ReportGenerator;
pub use scheduler::{RunOutcome, Scheduler};
