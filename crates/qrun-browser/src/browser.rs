//! Browser lifecycle management.
//!
//! [`TestBrowser`] launches one Chrome process per run and hands out tabs.
//! It is shared by every scheduler lane, so all methods take `&self`.

use crate::error::{BrowserError, Result};
use crate::page::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Configuration for launching a browser.
#[derive(Debug, Clone)]
pub struct TestBrowserConfig {
    /// Run in headless mode (default: true).
    pub headless: bool,

    /// Browser window size (default: 1280x800).
    pub window_size: (u32, u32),

    /// Additional Chrome arguments.
    pub args: Vec<String>,

    /// Chrome executable path (None = auto-detect).
    pub chrome_path: Option<PathBuf>,

    /// Timeout for a single DevTools request, navigation included.
    pub request_timeout: Duration,
}

impl TestBrowserConfig {
    /// Creates a new config with defaults for headless runs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows the browser window.
    #[must_use]
    pub fn visible(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Uses a specific Chrome executable.
    #[must_use]
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Converts to chromiumoxide `BrowserConfig`.
    fn to_browser_config(&self) -> Result<BrowserConfig> {
        let mut config = BrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .window_size(self.window_size.0, self.window_size.1);

        if !self.headless {
            config = config.with_head();
        }

        // A unique profile per launch lets several runs share a machine
        let user_data_dir = std::env::temp_dir().join(format!("qrun-{}", uuid::Uuid::new_v4()));
        config = config.user_data_dir(user_data_dir);

        for arg in &self.args {
            config = config.arg(arg.clone());
        }

        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path.clone());
        }

        config.build().map_err(|e| BrowserError::LaunchFailed {
            reason: format!("invalid browser configuration: {e}"),
            source: None,
        })
    }
}

impl Default for TestBrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1280, 800),
            args: vec![
                // Required when user namespaces are unavailable (containers, CI)
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            chrome_path: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A managed browser process.
///
/// Call [`TestBrowser::close`] when the run is over; dropping an open
/// browser kills the process without a graceful shutdown.
pub struct TestBrowser {
    inner: Mutex<Option<Browser>>,
}

impl TestBrowser {
    /// Launches Chrome and connects to it over the DevTools protocol.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` if Chrome is not installed, not executable,
    /// or fails to start.
    pub async fn launch(config: TestBrowserConfig) -> Result<Self> {
        debug!(?config, "Launching browser");

        let browser_config = config.to_browser_config()?;

        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| BrowserError::LaunchFailed {
                    reason: "failed to launch Chrome process".to_string(),
                    source: Some(Box::new(e)),
                })?;

        // chromiumoxide only processes CDP events while the handler is polled
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        debug!("Browser launched");

        Ok(Self {
            inner: Mutex::new(Some(browser)),
        })
    }

    /// Opens a new blank tab.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyClosed` if the browser has been closed.
    pub async fn new_page(&self) -> Result<Page> {
        let browser = self.inner.lock().await;
        let browser = browser.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let chrome_page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        Ok(Page::new(chrome_page))
    }

    /// Closes the browser and waits for the process to exit.
    ///
    /// Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser fails to close gracefully.
    pub async fn close(&self) -> Result<()> {
        if let Some(mut browser) = self.inner.lock().await.take() {
            debug!("Closing browser");
            browser
                .close()
                .await
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;
            if let Err(e) = browser.wait().await {
                debug!("Browser process did not exit cleanly: {}", e);
            }
        }

        Ok(())
    }

    /// Returns true if the browser has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

impl Drop for TestBrowser {
    fn drop(&mut self) {
        // chromiumoxide's Browser kills the process when dropped
        if let Ok(browser) = self.inner.try_lock() {
            if browser.is_some() {
                warn!("Browser dropped without close(), killing the process");
            }
        }
    }
}
