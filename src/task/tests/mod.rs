//! Unit tests for the task module.
//!
//! Shared builders live here; tests are grouped by concern.


use crate::task::domain::{
    PersistedTaskData, Task, TaskControl, TaskId, TaskKind, TaskPriority, TaskStatus,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Fixed reference instant for deterministic ordering tests.
pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid reference instant")
}

/// Builder for tasks in arbitrary persisted states.
#[derive(Debug, Clone)]
pub(super) struct TaskBuilder {
    data: PersistedTaskData,
}

impl TaskBuilder {
    pub(super) fn new() -> Self {
        Self {
            data: PersistedTaskData {
                id: TaskId::new(),
                description: "Prepare the migration plan".to_owned(),
                kind: TaskKind::Immediate,
                priority: TaskPriority::Medium,
                status: TaskStatus::Pending,
                control: TaskControl::Assistant,
                model: "default".to_owned(),
                scheduled_for: None,
                queued_at: None,
                executed_at: None,
                completed_at: None,
                error: None,
                result: None,
                created_at: epoch(),
                updated_at: epoch(),
                revision: 0,
            },
        }
    }

    pub(super) const fn status(mut self, status: TaskStatus) -> Self {
        self.data.status = status;
        self
    }

    pub(super) const fn control(mut self, control: TaskControl) -> Self {
        self.data.control = control;
        self
    }

    pub(super) const fn priority(mut self, priority: TaskPriority) -> Self {
        self.data.priority = priority;
        self
    }

    pub(super) const fn revision(mut self, revision: u64) -> Self {
        self.data.revision = revision;
        self
    }

    pub(super) fn executed(mut self) -> Self {
        self.data.executed_at = Some(epoch());
        self
    }

    pub(super) fn queued(mut self) -> Self {
        self.data.queued_at = Some(epoch());
        self
    }

    pub(super) fn created_minutes_after_epoch(mut self, minutes: i64) -> Self {
        self.data.created_at = epoch() + Duration::minutes(minutes);
        self
    }

    pub(super) fn scheduled_minutes_after_epoch(mut self, minutes: i64) -> Self {
        self.data.kind = TaskKind::Scheduled;
        self.data.scheduled_for = Some(epoch() + Duration::minutes(minutes));
        self
    }

    pub(super) fn build(self) -> Task {
        Task::from_persisted(self.data)
    }
}
