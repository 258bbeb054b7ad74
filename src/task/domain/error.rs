//! Error types for task domain validation, parsing and transition guards.

use super::{TaskControl, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task description is empty after trimming.
    #[error("task description must not be empty")]
    EmptyDescription,

    /// A message must carry at least one content block.
    #[error("message must contain at least one content block")]
    EmptyMessageContent,

    /// A user message text is empty after trimming.
    #[error("message text must not be empty")]
    EmptyMessageText,

    /// The model identifier is empty after trimming.
    #[error("model identifier must not be empty")]
    EmptyModel,

    /// Scheduled tasks need a due time.
    #[error("scheduled tasks require a scheduled_for timestamp")]
    MissingSchedule,

    /// An attached file name is empty after trimming.
    #[error("attached file name must not be empty")]
    EmptyFileName,
}

/// Error returned while parsing a task enumeration from its storage form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseTaskValueError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Rejected raw value.
    pub value: String,
}

impl ParseTaskValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// A control or status precondition that a transition did not satisfy.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The task is held by a different actor than the transition requires.
    #[error("expected control {expected}, found {actual}")]
    ControlMismatch {
        /// Control the transition requires.
        expected: TaskControl,
        /// Control the task currently has.
        actual: TaskControl,
    },

    /// The task already reached a terminal status.
    #[error("task is already {0}")]
    AlreadyTerminal(TaskStatus),

    /// The state machine does not allow the requested status change.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The task has already been queued.
    #[error("task has already been queued")]
    AlreadyQueued,

    /// A concurrent writer changed the task between read and conditional write.
    #[error("task was modified concurrently")]
    ConcurrentModification,
}
