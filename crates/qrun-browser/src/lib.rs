//! # qrun-browser
//!
//! Headless Chrome driver for the qrun test runner, built on chromiumoxide.
//!
//! ## Architecture
//!
//! - **TestBrowser**: one Chrome process per run, shared by every lane
//! - **Page**: a tab with navigation, scripting and console capture
//! - **BrowserExecutor**: the [`qrun_core::PageExecutor`] that runs a test
//!   page and waits for QUnit to report `done`
//! - **discover_test_pages**: loads a test suite and collects its pages
//!
//! Both the executor and discovery rely on the hook script the server
//! injects into every HTML page; it publishes results on `window` under
//! [`DONE_GLOBAL`] and [`TEST_PAGES_GLOBAL`].
//!
//! ## Example
//!
//! ```ignore
//! use qrun_browser::{BrowserExecutor, TestBrowser, TestBrowserConfig, WaitConfig};
//!
//! let browser = Arc::new(TestBrowser::launch(TestBrowserConfig::default()).await?);
//! let pages = discover_test_pages(&browser, &suite_url, WaitConfig::default()).await?;
//! let executor = BrowserExecutor::new(browser.clone(), Some(Duration::from_secs(60)));
//! ```
//!
//! Tests that need a real Chrome are `#[ignore]`; run them with
//! `cargo test -p qrun-browser -- --ignored`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod console;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod page;
pub mod wait;

pub use browser::{TestBrowser, TestBrowserConfig};
pub use console::{ConsoleCapture, ConsoleLevel, ConsoleMessage};
pub use discovery::{TEST_PAGES_GLOBAL, discover_test_pages, resolve_test_pages};
pub use error::{BrowserError, Result};
pub use executor::{BrowserExecutor, DONE_GLOBAL};
pub use page::Page;
pub use wait::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, WaitConfig};
