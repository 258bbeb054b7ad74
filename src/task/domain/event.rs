//! Domain events published after task writes commit.

use super::{Task, TaskId, TaskMessage};
use serde::{Deserialize, Serialize};

/// Outcome of a lifecycle transition.
///
/// `Created`, `Updated`, `Deleted` and `MessageAdded` are the events observers
/// need to stay synchronised; the remaining variants are in-process
/// notifications for collaborators such as the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created.
    Created {
        /// The stored task.
        task: Task,
    },
    /// A task changed; carries the committed state.
    Updated {
        /// The stored task.
        task: Task,
    },
    /// A task was deleted along with its messages and files.
    Deleted {
        /// The removed task's identifier.
        task_id: TaskId,
    },
    /// A message was appended to a task.
    MessageAdded {
        /// The stored message.
        message: TaskMessage,
    },
    /// A task reached `completed`.
    Completed {
        /// The stored task.
        task: Task,
    },
    /// A task reached `failed`.
    Failed {
        /// The stored task.
        task: Task,
    },
    /// Control returned to the assistant.
    Resumed {
        /// The stored task.
        task: Task,
    },
    /// Control moved to the user.
    TakenOver {
        /// The stored task.
        task: Task,
    },
    /// A task was cancelled.
    Cancelled {
        /// The stored task.
        task: Task,
    },
}

impl TaskEvent {
    /// Returns the identifier of the task the event concerns.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::Created { task }
            | Self::Updated { task }
            | Self::Completed { task }
            | Self::Failed { task }
            | Self::Resumed { task }
            | Self::TakenOver { task }
            | Self::Cancelled { task } => task.id(),
            Self::Deleted { task_id } => *task_id,
            Self::MessageAdded { message } => message.task_id(),
        }
    }

    /// Returns the event name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::MessageAdded { .. } => "message_added",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Resumed { .. } => "resumed",
            Self::TakenOver { .. } => "taken_over",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}
