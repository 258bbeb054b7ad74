//! Domain model for the task lifecycle.
//!
//! The task domain models creation, control handoff between user and
//! assistant, status transitions, ranking and the events those transitions
//! produce, while keeping all infrastructure concerns outside of the domain
//! boundary.

mod error;
mod event;
mod file;
mod ids;
mod message;
mod priority;
mod selection;
mod state;
mod task;

pub use error::{ParseTaskValueError, PreconditionFailure, TaskDomainError};
pub use event::TaskEvent;
pub use file::{AttachedFile, TaskFile};
pub use ids::{FileId, MessageId, TaskId};
pub use message::{ContentBlock, MessageRole, PersistedMessageData, TaskMessage};
pub use priority::{TaskKind, TaskPriority};
pub use selection::{NextTaskKey, awaits_queue, is_runnable, select_next};
pub use state::{TaskControl, TaskStatus};
pub use task::{NewTaskParams, PersistedTaskData, StatusChange, Task, TaskPatch};
