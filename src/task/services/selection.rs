//! Read paths used by the external execution loop.

use crate::task::{
    domain::Task,
    ports::{TaskRepository, TaskRepositoryResult},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;

/// Next-task selector and scheduled-task promoter.
///
/// Both operations are read-only; claiming a task goes through
/// `TaskLifecycleService::mark_queued`.
#[derive(Clone)]
pub struct TaskSelectionService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> TaskSelectionService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a selection service over `repository`.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Returns the single best runnable task, if any.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the query fails.
    pub async fn next_task(&self) -> TaskRepositoryResult<Option<Task>> {
        let next = self.repository.next_task().await?;
        if let Some(task) = &next {
            tracing::debug!(
                task_id = %task.id(),
                status = %task.status(),
                priority = %task.priority(),
                "next task selected"
            );
        }
        Ok(next)
    }

    /// Returns every scheduled task not yet queued, earliest due first.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the query fails.
    pub async fn scheduled_awaiting_queue(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.repository.scheduled_awaiting_queue().await
    }

    /// Returns the scheduled tasks whose due time is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the query fails.
    pub async fn due_at(&self, now: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>> {
        let mut awaiting = self.scheduled_awaiting_queue().await?;
        awaiting.retain(|task| task.scheduled_for().is_some_and(|due| due <= now));
        Ok(awaiting)
    }

    /// Returns the scheduled tasks that are due according to the service clock.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the query fails.
    pub async fn due_for_promotion(&self) -> TaskRepositoryResult<Vec<Task>> {
        let due = self.due_at(self.clock.utc()).await?;
        tracing::debug!(count = due.len(), "scheduled tasks due for promotion");
        Ok(due)
    }
}
