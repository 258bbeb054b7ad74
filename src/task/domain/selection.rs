//! Ranking policy for the next-task selector.

use super::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Composite ranking key; the smallest key runs next.
///
/// Unset timestamps are expressed as explicit `has_*` flags so the policy
/// does not depend on how a storage engine orders nulls. Fields compare in
/// declaration order:
///
/// 1. never-started tasks before resumed ones,
/// 2. higher priority first,
/// 3. not-yet-queued tasks before queued ones,
/// 4. oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NextTaskKey {
    /// Whether the task has run before.
    pub has_started: bool,
    /// Priority rank, reversed so higher ranks sort first.
    pub priority: Reverse<u8>,
    /// Whether an execution loop already claimed the task.
    pub has_been_queued: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NextTaskKey {
    /// Builds the ranking key for `task`.
    #[must_use]
    pub fn for_task(task: &Task) -> Self {
        Self {
            has_started: task.executed_at().is_some(),
            priority: Reverse(task.priority().rank()),
            has_been_queued: task.queued_at().is_some(),
            created_at: task.created_at(),
        }
    }
}

/// Returns whether the next-task selector considers `task` at all.
#[must_use]
pub fn is_runnable(task: &Task) -> bool {
    TaskStatus::RUNNABLE.contains(&task.status())
}

/// Picks the best runnable candidate from `tasks`.
///
/// Ties on the full key keep the first candidate.
#[must_use]
pub fn select_next<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Option<&'a Task> {
    tasks
        .into_iter()
        .filter(|task| is_runnable(task))
        .min_by_key(|task| NextTaskKey::for_task(task))
}

/// Returns whether the scheduled-task promoter reports `task`.
#[must_use]
pub const fn awaits_queue(task: &Task) -> bool {
    task.scheduled_for().is_some() && task.queued_at().is_none()
}
