//! Error types for the bridge.

use std::fmt;

/// A script evaluation failure reported by the engine.
///
/// Carries the engine's message plus best-effort source location. The
/// location is diagnostic only; `source_url` is whatever logical URL the
/// host passed to `execute_application_script`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Engine-reported error message.
    pub message: String,
    /// Logical URL of the script that failed, if known.
    pub source_url: Option<String>,
    /// Line number within the script, if the engine reported one.
    pub line: Option<u32>,
}

impl ExecutionError {
    /// Create an error with a message and no location info.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_url: None,
            line: None,
        }
    }

    /// Attach a source URL and optional line number.
    pub fn with_location(mut self, source_url: impl Into<String>, line: Option<u32>) -> Self {
        self.source_url = Some(source_url.into());
        self.line = line;
        self
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.source_url, self.line) {
            (Some(url), Some(line)) => write!(f, " ({}:{})", url, line),
            (Some(url), None) => write!(f, " ({})", url),
            (None, Some(line)) => write!(f, " (line {})", line),
            (None, None) => write!(f, " (no location info)"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Errors that can occur in the bridge.
///
/// Calls arriving after destruction has begun are deliberately *not* errors;
/// they are defined as silent no-ops so teardown races never surface as
/// spurious failures.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Script evaluation failed inside the engine.
    #[error("script execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// A raw batch payload did not conform to the batch encoding.
    ///
    /// This indicates an engine-side contract violation and is never
    /// retried.
    #[error("malformed call batch: {reason}")]
    BatchDecode { reason: String },

    /// The threaded executor has been terminated.
    #[error("executor has terminated")]
    Terminated,

    /// The executor's command channel closed unexpectedly.
    #[error("executor channel closed")]
    ChannelClosed,

    /// The executor worker thread panicked.
    #[error("executor thread panicked")]
    ThreadPanic,

    /// Spawning the executor worker thread failed.
    #[error("failed to spawn executor thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand for a decode failure.
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        BridgeError::BatchDecode {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display_with_full_location() {
        let err = ExecutionError::new("ReferenceError: x is not defined")
            .with_location("app://main.js", Some(42));
        assert_eq!(
            err.to_string(),
            "ReferenceError: x is not defined (app://main.js:42)"
        );
    }

    #[test]
    fn test_execution_error_display_without_location() {
        let err = ExecutionError::new("SyntaxError");
        assert_eq!(err.to_string(), "SyntaxError (no location info)");
    }

    #[test]
    fn test_bridge_error_wraps_execution_error() {
        let err: BridgeError = ExecutionError::new("boom")
            .with_location("app://main.js", None)
            .into();
        assert_eq!(
            err.to_string(),
            "script execution failed: boom (app://main.js)"
        );
    }
}
