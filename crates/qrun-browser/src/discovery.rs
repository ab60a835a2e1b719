//! Test suite discovery.
//!
//! A UI5 test suite page declares its pages through `jsUnitTestSuite`.
//! The hook script replaces that class with a recorder and publishes the
//! collected entries on `window["qrun/testPages"]` once the suite is built.

use crate::browser::TestBrowser;
use crate::error::{BrowserError, Result};
use crate::wait::WaitConfig;
use tracing::{debug, info};
use url::Url;

/// Global the hook script sets with the pages a suite declared.
pub const TEST_PAGES_GLOBAL: &str = "qrun/testPages";

/// Loads the suite at `suite_url` and returns its test page URLs.
///
/// Entries are resolved against the suite URL and deduplicated, keeping
/// the order in which the suite declared them.
///
/// # Errors
///
/// Returns an error if the suite cannot be loaded, never publishes its
/// pages within `config.timeout`, or lists an unresolvable URL.
pub async fn discover_test_pages(
    browser: &TestBrowser,
    suite_url: &str,
    config: WaitConfig,
) -> Result<Vec<String>> {
    info!(url = suite_url, "Extracting test pages");

    let page = browser.new_page().await?;
    let listed = match page.navigate(suite_url).await {
        Ok(()) => page.wait_for_global::<Vec<String>>(TEST_PAGES_GLOBAL, config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = page.close().await {
        debug!("Failed to close test suite page: {}", e);
    }

    let urls = resolve_test_pages(suite_url, &listed?)?;
    info!(count = urls.len(), "Test pages extracted");
    Ok(urls)
}

/// Resolves suite entries into absolute, unique URLs.
pub fn resolve_test_pages(suite_url: &str, entries: &[String]) -> Result<Vec<String>> {
    let base = Url::parse(suite_url).map_err(|e| BrowserError::InvalidUrl {
        url: suite_url.to_string(),
        reason: e.to_string(),
    })?;

    let mut urls: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let url = base
            .join(entry)
            .map_err(|e| BrowserError::InvalidUrl {
                url: entry.clone(),
                reason: e.to_string(),
            })?
            .to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = "http://localhost:8045/test/testsuite.qunit.html";

    #[test]
    fn relative_entries_resolve_against_the_suite() {
        let entries = vec![
            "unit/unitTests.qunit.html".to_string(),
            "/test-resources/sap/m/qunit/Button.qunit.html".to_string(),
            "integration/opaTests.qunit.html?journey=Main".to_string(),
        ];

        let urls = resolve_test_pages(SUITE, &entries).unwrap();

        assert_eq!(
            urls,
            vec![
                "http://localhost:8045/test/unit/unitTests.qunit.html",
                "http://localhost:8045/test-resources/sap/m/qunit/Button.qunit.html",
                "http://localhost:8045/test/integration/opaTests.qunit.html?journey=Main",
            ]
        );
    }

    #[test]
    fn duplicates_keep_their_first_position() {
        let entries = vec![
            "b.qunit.html".to_string(),
            "a.qunit.html".to_string(),
            "./b.qunit.html".to_string(),
        ];

        let urls = resolve_test_pages(SUITE, &entries).unwrap();

        assert_eq!(
            urls,
            vec![
                "http://localhost:8045/test/b.qunit.html",
                "http://localhost:8045/test/a.qunit.html",
            ]
        );
    }

    #[test]
    fn empty_suite_yields_no_pages() {
        assert!(resolve_test_pages(SUITE, &[]).unwrap().is_empty());
    }

    #[test]
    fn invalid_suite_url_is_rejected() {
        let result = resolve_test_pages("not a url", &["a.html".to_string()]);
        assert!(matches!(result, Err(BrowserError::InvalidUrl { .. })));
    }
}
