//! Test page outcomes and the page execution collaborator.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one QUnit test, as reported by `testDone`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Module the test belongs to
    #[serde(default)]
    pub module: String,
    /// Test name
    pub name: String,
    /// Failed assertions
    pub failed: u64,
    /// Passed assertions
    pub passed: u64,
    /// Whether the test was skipped
    #[serde(default)]
    pub skipped: bool,
    /// Runtime in milliseconds
    #[serde(default)]
    pub runtime: u64,
    /// Messages of the failed assertions, in the order they were logged
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TestResult {
    /// `module > name`, or just the name for tests outside a module.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{} > {}", self.module, self.name)
        }
    }
}

/// What a test page reported once its suite signalled completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPageReport {
    /// Number of failed assertions
    pub failed: u64,
    /// Number of passed assertions
    pub passed: u64,
    /// Total number of assertions
    pub total: u64,
    /// Runtime reported by the page, in milliseconds
    #[serde(default)]
    pub runtime: u64,
    /// Every test the page ran
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestResult>,
}

impl TestPageReport {
    /// Returns true if no assertion failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Tests with at least one failed assertion.
    pub fn failed_tests(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(|test| test.failed > 0)
    }
}

/// Terminal outcome of one discovered test page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageOutcome {
    /// The page ran and every assertion passed
    Passed,
    /// The page ran and failed, or its execution errored
    Failed,
    /// Skipped because the global deadline had passed when it was claimed
    GlobalTimeout,
    /// Skipped because fail-fast was active and a prior page had failed
    FailFastSkipped,
}

impl PageOutcome {
    /// Returns true if the page was executed (as opposed to skipped).
    #[must_use]
    pub fn was_executed(&self) -> bool {
        matches!(self, PageOutcome::Passed | PageOutcome::Failed)
    }
}

/// What the job remembers about a page once it reached a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Page URL as discovered
    pub url: String,
    /// Terminal outcome
    pub outcome: PageOutcome,
    /// Counters reported by the page, when it ran to completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TestPageReport>,
    /// Execution error message, when the page could not be run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs one test page to completion.
///
/// Implementations load the URL, wait for the page to signal that its
/// suite finished, and return the counters it reported. An `Err` is treated
/// as a failed page; it never aborts the run.
#[async_trait]
pub trait PageExecutor: Send + Sync {
    /// Executes the test page at `url`.
    async fn execute(&self, url: &str) -> Result<TestPageReport, CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_success_depends_on_failures_only() {
        let ok = TestPageReport {
            failed: 0,
            passed: 3,
            total: 3,
            runtime: 12,
            tests: Vec::new(),
        };
        assert!(ok.is_success());

        let ko = TestPageReport { failed: 1, ..ok };
        assert!(!ko.is_success());
    }

    #[test]
    fn skipped_outcomes_are_not_executed() {
        assert!(PageOutcome::Passed.was_executed());
        assert!(PageOutcome::Failed.was_executed());
        assert!(!PageOutcome::GlobalTimeout.was_executed());
        assert!(!PageOutcome::FailFastSkipped.was_executed());
    }

    #[test]
    fn report_deserializes_without_runtime() {
        let report: TestPageReport =
            serde_json::from_str(r#"{"failed":2,"passed":1,"total":3}"#).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.runtime, 0);
        assert!(report.tests.is_empty());
    }

    #[test]
    fn failed_tests_keep_their_names_and_messages() {
        let report: TestPageReport = serde_json::from_str(
            r#"{
                "failed": 1, "passed": 2, "total": 3, "runtime": 40,
                "tests": [
                    { "module": "Formatter", "name": "formats dates", "failed": 0, "passed": 2 },
                    { "module": "Formatter", "name": "formats amounts", "failed": 1, "passed": 0,
                      "errors": ["expected '1.00 EUR' but was '1 EUR'"] },
                    { "name": "unnamed module", "failed": 0, "passed": 0, "skipped": true }
                ]
            }"#,
        )
        .unwrap();

        let failed: Vec<_> = report.failed_tests().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].full_name(), "Formatter > formats amounts");
        assert_eq!(failed[0].errors, vec!["expected '1.00 EUR' but was '1 EUR'"]);
        assert_eq!(report.tests[2].full_name(), "unnamed module");
        assert!(report.tests[2].skipped);
    }
}
