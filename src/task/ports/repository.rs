//! Repository port for task, message and file persistence.

use crate::task::domain::{Task, TaskControl, TaskFile, TaskId, TaskMessage, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Condition a stored row must satisfy for a guarded write to apply.
///
/// Repositories evaluate the guard and the write as one atomic step, so two
/// callers racing on the same precondition cannot both succeed. A guard
/// pinned to a revision also rejects any row written since that revision was
/// read, whichever columns the other write touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskWriteGuard {
    expected_control: Option<TaskControl>,
    allowed_statuses: Vec<TaskStatus>,
    require_unqueued: bool,
    expected_revision: Option<u64>,
}

impl TaskWriteGuard {
    /// Guard that only requires the row to exist.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Guard requiring the stored status to be exactly `status`.
    #[must_use]
    pub fn status_is(status: TaskStatus) -> Self {
        Self {
            allowed_statuses: vec![status],
            ..Self::default()
        }
    }

    /// Guard requiring a non-terminal stored status.
    #[must_use]
    pub fn active() -> Self {
        Self {
            allowed_statuses: TaskStatus::ACTIVE.to_vec(),
            ..Self::default()
        }
    }

    /// Additionally requires the stored control to be `control`.
    #[must_use]
    pub const fn with_control(mut self, control: TaskControl) -> Self {
        self.expected_control = Some(control);
        self
    }

    /// Additionally requires the task not to have been queued.
    #[must_use]
    pub const fn unqueued(mut self) -> Self {
        self.require_unqueued = true;
        self
    }

    /// Additionally requires the stored revision to be `revision`.
    #[must_use]
    pub const fn at_revision(mut self, revision: u64) -> Self {
        self.expected_revision = Some(revision);
        self
    }

    /// Returns the required control, if any.
    #[must_use]
    pub const fn expected_control(&self) -> Option<TaskControl> {
        self.expected_control
    }

    /// Returns the accepted stored statuses; empty accepts every status.
    #[must_use]
    pub fn allowed_statuses(&self) -> &[TaskStatus] {
        &self.allowed_statuses
    }

    /// Returns whether the task must not have been queued.
    #[must_use]
    pub const fn requires_unqueued(&self) -> bool {
        self.require_unqueued
    }

    /// Returns the required stored revision, if any.
    #[must_use]
    pub const fn expected_revision(&self) -> Option<u64> {
        self.expected_revision
    }

    /// Evaluates the guard against a stored task.
    #[must_use]
    pub fn admits(&self, stored: &Task) -> bool {
        let control_ok = self
            .expected_control
            .is_none_or(|control| stored.control() == control);
        let status_ok =
            self.allowed_statuses.is_empty() || self.allowed_statuses.contains(&stored.status());
        let queue_ok = !self.require_unqueued || stored.queued_at().is_none();
        let revision_ok = self
            .expected_revision
            .is_none_or(|revision| stored.revision() == revision);
        control_ok && status_ok && queue_ok && revision_ok
    }
}

/// Paged task listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskListQuery {
    status: Option<TaskStatus>,
    page: u32,
    page_size: u32,
}

impl TaskListQuery {
    /// Largest accepted page size.
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Creates a listing request for a 1-based page.
    ///
    /// Out-of-range values are clamped into `1..` and `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            status: None,
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    /// Restricts the listing to tasks with `status`.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the status filter.
    #[must_use]
    pub const fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    /// Returns the 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }
}

impl Default for TaskListQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of a task listing, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPage {
    /// Tasks on this page.
    pub tasks: Vec<Task>,
    /// Number of tasks matching the filter across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
}

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task with its initial message and attached files.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn create(
        &self,
        task: &Task,
        initial_message: &TaskMessage,
        files: &[TaskFile],
    ) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Lists tasks, newest first.
    async fn list(&self, query: TaskListQuery) -> TaskRepositoryResult<TaskPage>;

    /// Replaces the stored task when the stored row satisfies `guard`.
    ///
    /// The written row takes the revision carried by `task`.
    ///
    /// Returns `false` when no row was written, either because the task does
    /// not exist or because the guard rejected the stored state.
    async fn update_guarded(
        &self,
        task: &Task,
        guard: &TaskWriteGuard,
    ) -> TaskRepositoryResult<bool>;

    /// Deletes a task together with its messages and files.
    ///
    /// Returns `false` when the task did not exist.
    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool>;

    /// Appends a message to its task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the owning task does not
    /// exist.
    async fn append_message(&self, message: &TaskMessage) -> TaskRepositoryResult<()>;

    /// Returns the messages of a task in insertion order.
    async fn messages(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskMessage>>;

    /// Returns the files attached to a task.
    async fn files(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskFile>>;

    /// Returns the best runnable task according to the next-task ranking.
    async fn next_task(&self) -> TaskRepositoryResult<Option<Task>>;

    /// Returns scheduled tasks that have not been queued, earliest due first.
    async fn scheduled_awaiting_queue(&self) -> TaskRepositoryResult<Vec<Task>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted task data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
