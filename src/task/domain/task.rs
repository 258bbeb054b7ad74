//! Task aggregate root and its control/status transitions.

use super::{
    PreconditionFailure, TaskControl, TaskDomainError, TaskId, TaskKind, TaskPriority, TaskStatus,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Validated input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskParams {
    /// Free-form description of the work.
    pub description: String,
    /// How the task enters the run queue.
    pub kind: TaskKind,
    /// Ranking priority.
    pub priority: TaskPriority,
    /// Model identifier used by the execution engine.
    pub model: String,
    /// Due time for scheduled tasks.
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    description: String,
    kind: TaskKind,
    priority: TaskPriority,
    status: TaskStatus,
    control: TaskControl,
    model: String,
    scheduled_for: Option<DateTime<Utc>>,
    queued_at: Option<DateTime<Utc>>,
    executed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    result: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: u64,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted description.
    pub description: String,
    /// Persisted kind.
    pub kind: TaskKind,
    /// Persisted priority.
    pub priority: TaskPriority,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted control owner.
    pub control: TaskControl,
    /// Persisted model identifier.
    pub model: String,
    /// Persisted due time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Persisted queue timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Persisted first-run timestamp.
    pub executed_at: Option<DateTime<Utc>>,
    /// Persisted terminal timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted error text.
    pub error: Option<String>,
    /// Persisted result text.
    pub result: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted write counter.
    pub revision: u64,
}

/// Partial field update requested through `update`.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// New model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// New lifecycle status, validated against the transition table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New due time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Error text reported by the execution engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result text reported by the execution engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the due time.
    #[must_use]
    pub const fn with_scheduled_for(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(scheduled_for);
        self
    }

    /// Sets the error text.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the result text.
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Validates free-text fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyDescription`] or
    /// [`TaskDomainError::EmptyModel`] when a provided value is blank.
    pub fn validate(&self) -> Result<(), TaskDomainError> {
        if self
            .description
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(TaskDomainError::EmptyDescription);
        }
        if self
            .model
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(TaskDomainError::EmptyModel);
        }
        Ok(())
    }
}

/// Status change applied by a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status before the patch.
    pub from: TaskStatus,
    /// Status after the patch.
    pub to: TaskStatus,
}

impl Task {
    /// Creates a new pending task controlled by the assistant.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError`] when the description or model is blank, or
    /// when a scheduled task has no due time.
    pub fn new(params: NewTaskParams, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let description = params.description.trim();
        if description.is_empty() {
            return Err(TaskDomainError::EmptyDescription);
        }
        let model = params.model.trim();
        if model.is_empty() {
            return Err(TaskDomainError::EmptyModel);
        }
        if params.kind == TaskKind::Scheduled && params.scheduled_for.is_none() {
            return Err(TaskDomainError::MissingSchedule);
        }

        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            description: description.to_owned(),
            kind: params.kind,
            priority: params.priority,
            status: TaskStatus::Pending,
            control: TaskControl::Assistant,
            model: model.to_owned(),
            scheduled_for: params.scheduled_for,
            queued_at: None,
            executed_at: None,
            completed_at: None,
            error: None,
            result: None,
            created_at: timestamp,
            updated_at: timestamp,
            revision: 0,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            description: data.description,
            kind: data.kind,
            priority: data.priority,
            status: data.status,
            control: data.control,
            model: data.model,
            scheduled_for: data.scheduled_for,
            queued_at: data.queued_at,
            executed_at: data.executed_at,
            completed_at: data.completed_at,
            error: data.error,
            result: data.result,
            created_at: data.created_at,
            updated_at: data.updated_at,
            revision: data.revision,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the task kind.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the control owner.
    #[must_use]
    pub const fn control(&self) -> TaskControl {
        self.control
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the due time, if any.
    #[must_use]
    pub const fn scheduled_for(&self) -> Option<DateTime<Utc>> {
        self.scheduled_for
    }

    /// Returns when the task was queued, if it was.
    #[must_use]
    pub const fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.queued_at
    }

    /// Returns when the task first ran, if it did.
    #[must_use]
    pub const fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    /// Returns when the task reached a terminal status, if it did.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the error text, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the result text, if any.
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the number of committed writes since creation.
    ///
    /// Guarded writes compare this counter so that a write computed from a
    /// stale read never replaces a newer row.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Advances the revision for the next write and returns the one it
    /// replaces.
    pub const fn advance_revision(&mut self) -> u64 {
        let replaced = self.revision;
        self.revision = replaced.saturating_add(1);
        replaced
    }

    /// Applies a partial update.
    ///
    /// Returns the status change when the patch moved the task to a new
    /// status. Fields are only written once the status change is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionFailure::InvalidStatusTransition`] when the
    /// requested status is not reachable from the current one.
    pub fn apply_patch(
        &mut self,
        patch: &TaskPatch,
        clock: &impl Clock,
    ) -> Result<Option<StatusChange>, PreconditionFailure> {
        let from = self.status;
        let status_change = match patch.status {
            Some(to) if to != from => {
                if !from.can_transition_to(to) {
                    return Err(PreconditionFailure::InvalidStatusTransition { from, to });
                }
                Some(StatusChange { from, to })
            }
            _ => None,
        };

        let now = clock.utc();
        if let Some(description) = &patch.description {
            description.trim().clone_into(&mut self.description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(model) = &patch.model {
            model.trim().clone_into(&mut self.model);
        }
        if let Some(scheduled_for) = patch.scheduled_for {
            self.scheduled_for = Some(scheduled_for);
        }
        if let Some(error) = &patch.error {
            self.error = Some(error.clone());
        }
        if let Some(result) = &patch.result {
            self.result = Some(result.clone());
        }
        if let Some(change) = status_change {
            self.enter_status(change.to, now);
        }
        self.updated_at = now;
        Ok(status_change)
    }

    /// Hands control back to the assistant and marks the task running.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionFailure::AlreadyTerminal`] for finished tasks and
    /// [`PreconditionFailure::ControlMismatch`] unless the user holds control.
    pub fn resume(&mut self, clock: &impl Clock) -> Result<(), PreconditionFailure> {
        self.ensure_active()?;
        self.ensure_control(TaskControl::User)?;
        let now = clock.utc();
        self.control = TaskControl::Assistant;
        if self.status != TaskStatus::Running {
            self.enter_status(TaskStatus::Running, now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Hands control to the user.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionFailure::AlreadyTerminal`] for finished tasks and
    /// [`PreconditionFailure::ControlMismatch`] unless the assistant holds
    /// control.
    pub fn take_over(&mut self, clock: &impl Clock) -> Result<(), PreconditionFailure> {
        self.ensure_active()?;
        self.ensure_control(TaskControl::Assistant)?;
        self.control = TaskControl::User;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Cancels the task.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionFailure::AlreadyTerminal`] when the task already
    /// reached a terminal status.
    pub fn cancel(&mut self, clock: &impl Clock) -> Result<(), PreconditionFailure> {
        self.ensure_active()?;
        let now = clock.utc();
        self.enter_status(TaskStatus::Cancelled, now);
        self.updated_at = now;
        Ok(())
    }

    /// Records that an execution loop claimed the task.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionFailure::AlreadyTerminal`] for finished tasks and
    /// [`PreconditionFailure::AlreadyQueued`] when the task was claimed
    /// before.
    pub fn mark_queued(&mut self, clock: &impl Clock) -> Result<(), PreconditionFailure> {
        self.ensure_active()?;
        if self.queued_at.is_some() {
            return Err(PreconditionFailure::AlreadyQueued);
        }
        let now = clock.utc();
        self.queued_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), PreconditionFailure> {
        if self.status.is_terminal() {
            return Err(PreconditionFailure::AlreadyTerminal(self.status));
        }
        Ok(())
    }

    fn ensure_control(&self, expected: TaskControl) -> Result<(), PreconditionFailure> {
        if self.control != expected {
            return Err(PreconditionFailure::ControlMismatch {
                expected,
                actual: self.control,
            });
        }
        Ok(())
    }

    /// Moves to `target`, stamping first-run and terminal timestamps once.
    fn enter_status(&mut self, target: TaskStatus, now: DateTime<Utc>) {
        self.status = target;
        if target == TaskStatus::Running && self.executed_at.is_none() {
            self.executed_at = Some(now);
        }
        if target.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }
}
