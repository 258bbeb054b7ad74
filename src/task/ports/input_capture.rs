//! Port for the external input-capture collaborator notified on control
//! handoff.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for input-capture calls.
pub type InputCaptureResult<T> = Result<T, InputCaptureError>;

/// The two actions the input-capture collaborator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCaptureAction {
    /// Begin capturing user input; sent when the user takes over.
    Start,
    /// Stop capturing user input; sent when the assistant resumes.
    Stop,
}

impl InputCaptureAction {
    /// Returns the action name used in endpoint paths and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for InputCaptureAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Best-effort notification contract for control handoff.
///
/// Both calls express idempotent intent; callers never retry them and never
/// let a failure affect the transition that triggered them.
#[async_trait]
pub trait InputCaptureHook: Send + Sync {
    /// Starts input capture.
    async fn start(&self) -> InputCaptureResult<()>;

    /// Stops input capture.
    async fn stop(&self) -> InputCaptureResult<()>;
}

/// Errors reported by input-capture adapters.
#[derive(Debug, Clone, Error)]
pub enum InputCaptureError {
    /// The collaborator answered with a non-success status.
    #[error("input capture {action} rejected with status {status}")]
    Rejected {
        /// Action that was rejected.
        action: InputCaptureAction,
        /// HTTP status code.
        status: u16,
    },

    /// The call did not finish within its bound.
    #[error("input capture {action} timed out after {timeout_ms} ms")]
    TimedOut {
        /// Action that timed out.
        action: InputCaptureAction,
        /// Bound in milliseconds.
        timeout_ms: u64,
    },

    /// The collaborator could not be reached.
    #[error("input capture transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl InputCaptureError {
    /// Wraps a transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
