//! Shared world state for control handoff BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use tasklane::task::{
    adapters::{input_capture::RecordingInputCaptureHook, memory::InMemoryTaskRepository},
    domain::Task,
    events::TaskEventChannel,
    services::{TaskLifecycleError, TaskLifecycleService},
};

/// Service type used by the BDD world.
pub type TestTaskService =
    TaskLifecycleService<InMemoryTaskRepository, RecordingInputCaptureHook, DefaultClock>;

/// Scenario world for handoff behaviour tests.
pub struct HandoffWorld {
    pub service: TestTaskService,
    pub hook: RecordingInputCaptureHook,
    pub task: Option<Task>,
    pub last_result: Option<Result<Task, TaskLifecycleError>>,
}

impl HandoffWorld {
    /// Creates a world with no task yet.
    #[must_use]
    pub fn new() -> Self {
        let hook = RecordingInputCaptureHook::new();
        let service = TaskLifecycleService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(hook.clone()),
            TaskEventChannel::new(32),
            Arc::new(DefaultClock),
        );

        Self {
            service,
            hook,
            task: None,
            last_result: None,
        }
    }

    /// Returns the scenario task.
    ///
    /// # Errors
    ///
    /// Returns an error when no task was created by a previous step.
    pub fn task(&self) -> Result<&Task, eyre::Report> {
        self.task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }

    /// Records an operation outcome, keeping the task current on success.
    pub fn record(&mut self, result: Result<Task, TaskLifecycleError>) {
        if let Ok(updated) = &result {
            self.task = Some(updated.clone());
        }
        self.last_result = Some(result);
    }
}

impl Default for HandoffWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> HandoffWorld {
    HandoffWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
