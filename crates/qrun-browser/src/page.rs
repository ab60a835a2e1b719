//! Page-level browser operations.
//!
//! A [`Page`] is one browser tab with its own console capture. Test pages
//! and the test suite page each get a fresh one.

use crate::console::{ConsoleCapture, parse_console_event};
use crate::error::{BrowserError, Result};
use crate::wait::{WaitConfig, wait_for_result, wait_for_value};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page as ChromePage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

/// A browser tab with console capture.
#[derive(Debug)]
pub struct Page {
    inner: ChromePage,
    console: ConsoleCapture,
    console_task: JoinHandle<()>,
}

impl Page {
    /// Wraps a chromiumoxide page and starts console capture.
    pub(crate) fn new(page: ChromePage) -> Self {
        let console = ConsoleCapture::new();
        let sink = console.clone();
        let listener = page.clone();

        let console_task = tokio::spawn(async move {
            if let Ok(mut events) = listener.event_listener::<EventConsoleApiCalled>().await {
                while let Some(event) = events.next().await {
                    sink.push(parse_console_event(&event));
                }
            }
        });

        Self {
            inner: page,
            console,
            console_task,
        }
    }

    /// Returns the console messages captured so far.
    #[must_use]
    pub fn console(&self) -> &ConsoleCapture {
        &self.console
    }

    /// Navigates to an absolute URL and waits for the document to load.
    ///
    /// # Errors
    ///
    /// Returns `NavigationFailed` if the page fails to load, or
    /// `WaitTimeout` if the document never becomes ready.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_for_load(WaitConfig::default()).await
    }

    /// Waits until `document.readyState` is `complete`.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the document is not ready in time.
    pub async fn wait_for_load(&self, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async move {
                let ready: String = self.evaluate("document.readyState").await?;
                Ok(ready == "complete")
            },
            config,
            "document ready",
        )
        .await
    }

    /// Executes JavaScript in the page context and deserializes the result.
    ///
    /// Do not pass unsanitized input; use [`Page::read_global`] to read a
    /// `window` property by name.
    ///
    /// # Errors
    ///
    /// Returns `ScriptExecutionFailed` if the script throws or its result
    /// does not deserialize into `T`.
    pub async fn evaluate<T>(&self, script: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Reads `window[name]`, `None` while it is unset.
    ///
    /// The value crosses the protocol as JSON text so that `undefined`,
    /// `null` and objects all arrive in one shape.
    ///
    /// # Errors
    ///
    /// Returns `ScriptExecutionFailed` if the page rejects the evaluation
    /// or the value does not deserialize into `T`.
    pub async fn read_global<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let json: String = self.evaluate(&global_reader(name)?).await?;
        serde_json::from_str(&json).map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))
    }

    /// Polls `window[name]` until it is set.
    ///
    /// # Errors
    ///
    /// Returns `WaitTimeout` if the value does not appear in time.
    pub async fn wait_for_global<T>(&self, name: &str, config: WaitConfig) -> Result<T>
    where
        T: DeserializeOwned,
    {
        wait_for_value(|| self.read_global(name), config, name).await
    }

    /// Returns the current page URL.
    ///
    /// # Errors
    ///
    /// Returns an error if script execution fails.
    pub async fn url(&self) -> Result<String> {
        self.evaluate("window.location.href").await
    }

    /// Closes the tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser refuses to close the target.
    pub async fn close(self) -> Result<()> {
        self.console_task.abort();
        self.inner.close().await?;
        Ok(())
    }
}

/// Builds the script behind [`Page::read_global`].
fn global_reader(name: &str) -> Result<String> {
    // JSON encoding keeps the property name a plain string literal
    let key =
        serde_json::to_string(name).map_err(|e| BrowserError::ScriptExecutionFailed(e.to_string()))?;
    Ok(format!(
        "(() => {{ const value = window[{key}]; return JSON.stringify(value === undefined ? null : value); }})()"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_reader_quotes_the_name() {
        let script = global_reader("qrun/done").unwrap();
        assert!(script.contains(r#"window["qrun/done"]"#));
    }

    #[test]
    fn global_reader_cannot_be_escaped() {
        let script = global_reader(r#"x"]; alert('xss'); window["y"#).unwrap();
        assert!(script.contains(r#"window["x\"]; alert('xss'); window[\"y"]"#));
    }

    #[test]
    fn unset_globals_decode_as_none() {
        let value: Option<u32> = serde_json::from_str("null").unwrap();
        assert_eq!(value, None);
        let value: Option<Vec<String>> = serde_json::from_str(r#"["a.html"]"#).unwrap();
        assert_eq!(value, Some(vec!["a.html".to_string()]));
    }
}
