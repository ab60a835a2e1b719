//! Test page execution in the browser.
//!
//! The hook script injected into every HTML page publishes the QUnit
//! `done` details on `window["qrun/done"]`. A page is finished once that
//! value appears.

use crate::browser::TestBrowser;
use crate::error::Result;
use crate::page::Page;
use crate::wait::WaitConfig;
use async_trait::async_trait;
use qrun_core::{CollaboratorError, PageExecutor, TestPageReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Global the hook script sets when QUnit reports `done`.
pub const DONE_GLOBAL: &str = "qrun/done";

/// Runs each test page in its own tab of a shared browser.
pub struct BrowserExecutor {
    browser: Arc<TestBrowser>,
    page_timeout: Option<Duration>,
}

impl BrowserExecutor {
    /// Creates an executor; `page_timeout` of `None` waits indefinitely.
    pub fn new(browser: Arc<TestBrowser>, page_timeout: Option<Duration>) -> Self {
        Self {
            browser,
            page_timeout,
        }
    }

    async fn run(&self, page: &Page, url: &str) -> Result<TestPageReport> {
        page.navigate(url).await?;
        page.wait_for_global(DONE_GLOBAL, WaitConfig::from_optional(self.page_timeout))
            .await
    }
}

#[async_trait]
impl PageExecutor for BrowserExecutor {
    async fn execute(&self, url: &str) -> std::result::Result<TestPageReport, CollaboratorError> {
        let page = self.browser.new_page().await?;
        let result = self.run(&page, url).await;

        if !matches!(&result, Ok(report) if report.is_success()) {
            for message in page.console().errors() {
                warn!(url, "console: {}", message);
            }
        }
        debug!(url, messages = page.console().len(), "Closing test page");

        if let Err(e) = page.close().await {
            debug!(url, "Failed to close test page: {}", e);
        }

        Ok(result?)
    }
}
