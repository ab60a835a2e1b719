//! Console message capture.
//!
//! Every page records what it wrote to the console so a failing or hanging
//! test page can be diagnosed from the runner's log.

use chromiumoxide::cdp::js_protocol::runtime::{ConsoleApiCalledType, EventConsoleApiCalled};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// The severity level of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleLevel {
    /// `console.log()`
    Log,
    /// `console.info()`
    Info,
    /// `console.warn()`
    Warning,
    /// `console.error()`
    Error,
    /// `console.debug()`
    Debug,
    /// Catch-all for other console APIs
    Other,
}

impl ConsoleLevel {
    /// Returns true if this is an error-level message.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleLevel::Error)
    }
}

impl From<&EventConsoleApiCalled> for ConsoleLevel {
    // Matched on variants directly; the generated CDP enum has no stable
    // string conversion across chromiumoxide versions.
    fn from(event: &EventConsoleApiCalled) -> Self {
        match event.r#type {
            ConsoleApiCalledType::Log => ConsoleLevel::Log,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Error => ConsoleLevel::Error,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Other,
        }
    }
}

/// A captured console message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity level
    pub level: ConsoleLevel,

    /// Message text; multiple arguments are joined with spaces.
    pub text: String,

    /// Source location if available (e.g., "app.js:42:10").
    pub source: Option<String>,
}

impl ConsoleMessage {
    /// Creates a new console message.
    #[must_use]
    pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            source: None,
        }
    }
}

impl std::fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({source})", self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Thread-safe console message accumulator, shared between the CDP event
/// task and whoever inspects the page.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    messages: Arc<Mutex<Vec<ConsoleMessage>>>,
}

impl ConsoleCapture {
    /// Creates a new, empty console capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message in arrival order.
    pub(crate) fn push(&self, message: ConsoleMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Returns all captured messages as a snapshot.
    #[must_use]
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns all error-level messages.
    #[must_use]
    pub fn errors(&self) -> Vec<ConsoleMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.level.is_error())
            .collect()
    }

    /// Returns the count of error messages.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.level.is_error())
            .count()
    }

    /// Returns the total number of messages captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no messages have been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts a CDP console event into a [`ConsoleMessage`].
pub(crate) fn parse_console_event(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let text = event
        .args
        .iter()
        .map(|arg| match arg.value.as_ref() {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => arg
                .description
                .clone()
                .unwrap_or_else(|| "<object>".to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut message = ConsoleMessage::new(ConsoleLevel::from(event), text);

    if let Some(frame) = event
        .stack_trace
        .as_ref()
        .and_then(|stack| stack.call_frames.first())
    {
        message.source = Some(format!(
            "{}:{}:{}",
            frame.url, frame.line_number, frame.column_number
        ));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_errors_count_as_errors() {
        assert!(ConsoleLevel::Error.is_error());
        assert!(!ConsoleLevel::Warning.is_error());
        assert!(!ConsoleLevel::Log.is_error());
    }

    #[test]
    fn capture_keeps_arrival_order() {
        let capture = ConsoleCapture::new();
        assert!(capture.is_empty());

        capture.push(ConsoleMessage::new(ConsoleLevel::Log, "loading"));
        capture.push(ConsoleMessage::new(ConsoleLevel::Error, "module not found"));
        capture.push(ConsoleMessage::new(ConsoleLevel::Warning, "deprecated"));

        assert_eq!(capture.len(), 3);
        assert_eq!(capture.error_count(), 1);
        let texts: Vec<_> = capture.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["loading", "module not found", "deprecated"]);
        assert_eq!(capture.errors()[0].text, "module not found");
    }

    #[test]
    fn clones_share_one_buffer() {
        let capture = ConsoleCapture::new();
        let writer = capture.clone();
        writer.push(ConsoleMessage::new(ConsoleLevel::Error, "boom"));

        assert_eq!(capture.error_count(), 1);
    }

    #[test]
    fn display_includes_source() {
        let mut message = ConsoleMessage::new(ConsoleLevel::Error, "boom");
        assert_eq!(message.to_string(), "boom");

        message.source = Some("app.js:4:2".to_string());
        assert_eq!(message.to_string(), "boom (app.js:4:2)");
    }
}
