//! Lifecycle controller: validates and applies every task transition.

use crate::task::{
    domain::{
        AttachedFile, ContentBlock, MessageRole, NewTaskParams, PreconditionFailure, Task,
        TaskControl, TaskDomainError, TaskEvent, TaskFile, TaskId, TaskKind, TaskMessage,
        TaskPatch, TaskPriority, TaskStatus,
    },
    events::TaskEventChannel,
    ports::{
        InputCaptureAction, InputCaptureHook, TaskListQuery, TaskPage, TaskRepository,
        TaskRepositoryError, TaskWriteGuard,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Model identifier used when a create request names none.
pub const DEFAULT_MODEL: &str = "default";

/// Default bound for a single input-capture call.
pub const DEFAULT_INPUT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    description: String,
    kind: TaskKind,
    priority: TaskPriority,
    model: Option<String>,
    scheduled_for: Option<DateTime<Utc>>,
    files: Vec<AttachedFile>,
}

impl CreateTaskRequest {
    /// Creates an immediate, medium-priority request.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind: TaskKind::Immediate,
            priority: TaskPriority::Medium,
            model: None,
            scheduled_for: None,
            files: Vec::new(),
        }
    }

    /// Sets the task kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Schedules the task and marks it as a scheduled task.
    #[must_use]
    pub const fn scheduled_for(mut self, due: DateTime<Utc>) -> Self {
        self.kind = TaskKind::Scheduled;
        self.scheduled_for = Some(due);
        self
    }

    /// Attaches files to the task.
    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = AttachedFile>) -> Self {
        self.files.extend(files);
        self
    }
}

/// Tunables for [`TaskLifecycleService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Model assigned when a create request names none.
    pub default_model: String,
    /// Upper bound for one input-capture call.
    pub input_capture_timeout: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_owned(),
            input_capture_timeout: DEFAULT_INPUT_CAPTURE_TIMEOUT,
        }
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Input validation failed.
    #[error(transparent)]
    Validation(#[from] TaskDomainError),
    /// No task exists with the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// The task's control or status does not allow the transition.
    #[error("precondition failed for task {task_id}: {failure}")]
    PreconditionFailed {
        /// Task the transition targeted.
        task_id: TaskId,
        /// The violated precondition.
        failure: PreconditionFailure,
    },
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

impl TaskLifecycleError {
    const fn precondition(task_id: TaskId, failure: PreconditionFailure) -> Self {
        Self::PreconditionFailed { task_id, failure }
    }

    fn from_repository(err: TaskRepositoryError) -> Self {
        match err {
            TaskRepositoryError::NotFound(task_id) => Self::NotFound(task_id),
            other => Self::Repository(other),
        }
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every precondition-guarded transition is written through
/// [`TaskRepository::update_guarded`]; events are published and hooks are
/// dispatched only after the write returns.
#[derive(Clone)]
pub struct TaskLifecycleService<R, H, C>
where
    R: TaskRepository,
    H: InputCaptureHook + 'static,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    input_capture: Arc<H>,
    events: TaskEventChannel,
    clock: Arc<C>,
    settings: LifecycleSettings,
}

impl<R, H, C> TaskLifecycleService<R, H, C>
where
    R: TaskRepository,
    H: InputCaptureHook + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service with default settings.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        input_capture: Arc<H>,
        events: TaskEventChannel,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            input_capture,
            events,
            clock,
            settings: LifecycleSettings::default(),
        }
    }

    /// Replaces the service settings.
    #[must_use]
    pub fn with_settings(mut self, settings: LifecycleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the channel this service publishes to.
    #[must_use]
    pub const fn events(&self) -> &TaskEventChannel {
        &self.events
    }

    /// Creates a pending, assistant-controlled task with its initial message.
    ///
    /// The initial user message holds the description followed by one note per
    /// attached file.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Validation`] for invalid input or
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let CreateTaskRequest {
            description,
            kind,
            priority,
            model,
            scheduled_for,
            files,
        } = request;

        let params = NewTaskParams {
            description,
            kind,
            priority,
            model: model.unwrap_or_else(|| self.settings.default_model.clone()),
            scheduled_for,
        };
        let task = Task::new(params, &*self.clock)?;

        let mut content = vec![ContentBlock::text(task.description())];
        content.extend(files.iter().map(|file| ContentBlock::text(file.note())));
        let initial_message =
            TaskMessage::new(task.id(), MessageRole::User, content, &*self.clock)?;
        let task_files = files
            .into_iter()
            .map(|file| TaskFile::attach(task.id(), file))
            .collect::<Result<Vec<_>, _>>()?;

        self.repository
            .create(&task, &initial_message, &task_files)
            .await?;
        tracing::info!(
            task_id = %task.id(),
            kind = %task.kind(),
            priority = %task.priority(),
            files = task_files.len(),
            "task created"
        );
        self.events.publish(TaskEvent::Created { task: task.clone() });
        Ok(task)
    }

    /// Returns a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn get(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))
    }

    /// Lists tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the query fails.
    pub async fn list(&self, query: TaskListQuery) -> TaskLifecycleResult<TaskPage> {
        Ok(self.repository.list(query).await?)
    }

    /// Returns the messages of a task in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn messages(&self, task_id: TaskId) -> TaskLifecycleResult<Vec<TaskMessage>> {
        self.get(task_id).await?;
        Ok(self.repository.messages(task_id).await?)
    }

    /// Returns the files attached to a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn files(&self, task_id: TaskId) -> TaskLifecycleResult<Vec<TaskFile>> {
        self.get(task_id).await?;
        Ok(self.repository.files(task_id).await?)
    }

    /// Applies a partial update.
    ///
    /// Entering `needs_help` while the assistant holds control also hands
    /// control to the user in the same write. Exactly one `Updated` event is
    /// published per successful call.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`],
    /// [`TaskLifecycleError::Validation`] for blank fields, or
    /// [`TaskLifecycleError::PreconditionFailed`] for a status change the state
    /// machine rejects or a concurrent status change.
    pub async fn update(&self, task_id: TaskId, patch: TaskPatch) -> TaskLifecycleResult<Task> {
        patch.validate()?;
        let mut task = self.get(task_id).await?;
        let observed = task.clone();

        let status_change = task
            .apply_patch(&patch, &*self.clock)
            .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;

        let mut guard = TaskWriteGuard::status_is(observed.status());
        let handed_over = status_change.is_some_and(|change| change.to == TaskStatus::NeedsHelp)
            && observed.control() == TaskControl::Assistant;
        if handed_over {
            task.take_over(&*self.clock)
                .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;
            guard = guard.with_control(TaskControl::Assistant);
        }

        self.commit(&mut task, guard).await?;
        tracing::info!(
            %task_id,
            status = %task.status(),
            control = %task.control(),
            "task updated"
        );

        match status_change.map(|change| change.to) {
            Some(TaskStatus::Completed) => {
                self.events.publish(TaskEvent::Completed { task: task.clone() });
            }
            Some(TaskStatus::Failed) => {
                self.events.publish(TaskEvent::Failed { task: task.clone() });
            }
            _ => {}
        }
        if handed_over {
            self.dispatch_input_capture(task_id, InputCaptureAction::Start);
            self.events.publish(TaskEvent::TakenOver { task: task.clone() });
        }
        self.events.publish(TaskEvent::Updated { task: task.clone() });
        Ok(task)
    }

    /// Returns control to the assistant and marks the task running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] or
    /// [`TaskLifecycleError::PreconditionFailed`] unless the user holds control
    /// of an unfinished task.
    pub async fn resume(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.get(task_id).await?;
        task.resume(&*self.clock)
            .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;
        self.commit(&mut task, TaskWriteGuard::active().with_control(TaskControl::User))
            .await?;
        tracing::info!(%task_id, "task resumed by assistant");

        self.dispatch_input_capture(task_id, InputCaptureAction::Stop);
        self.events.publish(TaskEvent::Resumed { task: task.clone() });
        self.events.publish(TaskEvent::Updated { task: task.clone() });
        Ok(task)
    }

    /// Hands control of the task to the user.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] or
    /// [`TaskLifecycleError::PreconditionFailed`] unless the assistant holds
    /// control of an unfinished task.
    pub async fn take_over(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.get(task_id).await?;
        task.take_over(&*self.clock)
            .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;
        self.commit(
            &mut task,
            TaskWriteGuard::active().with_control(TaskControl::Assistant),
        )
        .await?;
        tracing::info!(%task_id, "task taken over by user");

        self.dispatch_input_capture(task_id, InputCaptureAction::Start);
        self.events.publish(TaskEvent::TakenOver { task: task.clone() });
        self.events.publish(TaskEvent::Updated { task: task.clone() });
        Ok(task)
    }

    /// Cancels an unfinished task.
    ///
    /// Cancellation is cooperative: in-flight work is expected to observe the
    /// status and stop.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] or
    /// [`TaskLifecycleError::PreconditionFailed`] when the task is already
    /// terminal.
    pub async fn cancel(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.get(task_id).await?;
        task.cancel(&*self.clock)
            .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;
        self.commit(&mut task, TaskWriteGuard::active()).await?;
        tracing::info!(%task_id, "task cancelled");

        self.events.publish(TaskEvent::Cancelled { task: task.clone() });
        self.events.publish(TaskEvent::Updated { task: task.clone() });
        Ok(task)
    }

    /// Records that an execution loop claimed the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] or
    /// [`TaskLifecycleError::PreconditionFailed`] when the task was already
    /// queued or is terminal.
    pub async fn mark_queued(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.get(task_id).await?;
        task.mark_queued(&*self.clock)
            .map_err(|failure| TaskLifecycleError::precondition(task_id, failure))?;
        self.commit(&mut task, TaskWriteGuard::active().unqueued())
            .await?;
        tracing::debug!(%task_id, "task queued");

        self.events.publish(TaskEvent::Updated { task: task.clone() });
        Ok(task)
    }

    /// Deletes a task together with its messages and files.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn delete(&self, task_id: TaskId) -> TaskLifecycleResult<()> {
        if !self.repository.delete(task_id).await? {
            return Err(TaskLifecycleError::NotFound(task_id));
        }
        tracing::info!(%task_id, "task deleted");
        self.events.publish(TaskEvent::Deleted { task_id });
        Ok(())
    }

    /// Appends a user text message without touching status or control.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Validation`] for blank text or
    /// [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn add_message(
        &self,
        task_id: TaskId,
        text: impl Into<String>,
    ) -> TaskLifecycleResult<TaskMessage> {
        let message = TaskMessage::user_text(task_id, text, &*self.clock)?;
        self.append(message).await
    }

    /// Appends a message with arbitrary role and content, such as an
    /// assistant turn written by the execution engine.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Validation`] for empty content or
    /// [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn record_message(
        &self,
        task_id: TaskId,
        role: MessageRole,
        content: Vec<ContentBlock>,
    ) -> TaskLifecycleResult<TaskMessage> {
        let message = TaskMessage::new(task_id, role, content, &*self.clock)?;
        self.append(message).await
    }

    async fn append(&self, message: TaskMessage) -> TaskLifecycleResult<TaskMessage> {
        self.repository
            .append_message(&message)
            .await
            .map_err(TaskLifecycleError::from_repository)?;
        tracing::debug!(
            task_id = %message.task_id(),
            message_id = %message.id(),
            role = %message.role(),
            "message appended"
        );
        self.events.publish(TaskEvent::MessageAdded {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Writes `task` if the stored row still satisfies `guard` and has not
    /// been written since `task` was read.
    async fn commit(&self, task: &mut Task, guard: TaskWriteGuard) -> TaskLifecycleResult<()> {
        let read_at = task.advance_revision();
        let pinned = guard.at_revision(read_at);
        if self
            .repository
            .update_guarded(task, &pinned)
            .await
            .map_err(TaskLifecycleError::from_repository)?
        {
            return Ok(());
        }
        Err(self.explain_rejection(task.id(), &pinned).await)
    }

    /// Re-reads a task whose guarded write affected no rows.
    async fn explain_rejection(&self, task_id: TaskId, guard: &TaskWriteGuard) -> TaskLifecycleError {
        let stored = match self.repository.find_by_id(task_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return TaskLifecycleError::NotFound(task_id),
            Err(err) => return TaskLifecycleError::Repository(err),
        };

        let failure = if let Some(expected) = guard
            .expected_control()
            .filter(|expected| *expected != stored.control())
        {
            PreconditionFailure::ControlMismatch {
                expected,
                actual: stored.control(),
            }
        } else if stored.status().is_terminal()
            && !guard.allowed_statuses().contains(&stored.status())
        {
            PreconditionFailure::AlreadyTerminal(stored.status())
        } else if guard.requires_unqueued() && stored.queued_at().is_some() {
            PreconditionFailure::AlreadyQueued
        } else {
            PreconditionFailure::ConcurrentModification
        };
        tracing::debug!(%task_id, %failure, "guarded task write rejected");
        TaskLifecycleError::precondition(task_id, failure)
    }

    /// Runs an input-capture call in a detached task after the write.
    ///
    /// Failures and timeouts are logged and otherwise ignored.
    fn dispatch_input_capture(&self, task_id: TaskId, action: InputCaptureAction) {
        let hook = Arc::clone(&self.input_capture);
        let bound = self.settings.input_capture_timeout;
        let _detached = tokio::spawn(async move {
            let call = async {
                match action {
                    InputCaptureAction::Start => hook.start().await,
                    InputCaptureAction::Stop => hook.stop().await,
                }
            };
            match tokio::time::timeout(bound, call).await {
                Ok(Ok(())) => tracing::debug!(%task_id, %action, "input capture notified"),
                Ok(Err(err)) => {
                    tracing::warn!(%task_id, %action, error = %err, "input capture call failed");
                }
                Err(_) => tracing::warn!(
                    %task_id,
                    %action,
                    timeout_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
                    "input capture call timed out"
                ),
            }
        });
    }
}
