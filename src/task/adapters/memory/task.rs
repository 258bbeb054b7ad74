//! In-memory task store for tests and embedded use.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{Task, TaskFile, TaskId, TaskMessage, awaits_queue, select_next},
    ports::{
        TaskListQuery, TaskPage, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
        TaskWriteGuard,
    },
};

/// Thread-safe in-memory task repository.
///
/// Every write holds the state write lock for the whole guard check and
/// replacement, which makes guarded writes atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    messages: HashMap<TaskId, Vec<TaskMessage>>,
    files: HashMap<TaskId, Vec<TaskFile>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(
        &self,
        task: &Task,
        initial_message: &TaskMessage,
        files: &[TaskFile],
    ) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }

        state.tasks.insert(task.id(), task.clone());
        state
            .messages
            .insert(task.id(), vec![initial_message.clone()]);
        state.files.insert(task.id(), files.to_vec());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list(&self, query: TaskListQuery) -> TaskRepositoryResult<TaskPage> {
        let state = self.read()?;
        let mut matching: Vec<&Task> = state
            .tasks
            .values()
            .filter(|task| query.status().is_none_or(|status| task.status() == status))
            .collect();
        matching.sort_by_key(|task| (Reverse(task.created_at()), task.id()));

        let total = u64::try_from(matching.len()).map_err(TaskRepositoryError::persistence)?;
        let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(query.page_size()).unwrap_or(usize::MAX);
        let tasks = matching
            .into_iter()
            .skip(skip)
            .take(take)
            .cloned()
            .collect();

        Ok(TaskPage {
            tasks,
            total,
            page: query.page(),
            page_size: query.page_size(),
        })
    }

    async fn update_guarded(
        &self,
        task: &Task,
        guard: &TaskWriteGuard,
    ) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let Some(stored) = state.tasks.get_mut(&task.id()) else {
            return Ok(false);
        };
        if !guard.admits(stored) {
            return Ok(false);
        }
        *stored = task.clone();
        Ok(true)
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        if state.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        state.messages.remove(&id);
        state.files.remove(&id);
        Ok(true)
    }

    async fn append_message(&self, message: &TaskMessage) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.tasks.contains_key(&message.task_id()) {
            return Err(TaskRepositoryError::NotFound(message.task_id()));
        }
        state
            .messages
            .entry(message.task_id())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskMessage>> {
        let state = self.read()?;
        Ok(state.messages.get(&task_id).cloned().unwrap_or_default())
    }

    async fn files(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskFile>> {
        let state = self.read()?;
        Ok(state.files.get(&task_id).cloned().unwrap_or_default())
    }

    async fn next_task(&self) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        // Pre-sort by id so ties on the full ranking key resolve the same way
        // regardless of hash-map iteration order.
        let mut candidates: Vec<&Task> = state.tasks.values().collect();
        candidates.sort_by_key(|task| task.id());
        Ok(select_next(candidates).cloned())
    }

    async fn scheduled_awaiting_queue(&self) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut scheduled: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| awaits_queue(task))
            .cloned()
            .collect();
        scheduled.sort_by_key(|task| (task.scheduled_for(), task.created_at(), task.id()));
        Ok(scheduled)
    }
}
