//! Shared fixtures for in-memory integration tests.

use std::sync::Arc;
use std::time::Duration;

use tasklane::live::LiveMessage;
use tasklane::task::{
    adapters::{input_capture::RecordingInputCaptureHook, memory::InMemoryTaskRepository},
    events::TaskEventChannel,
    services::{TaskLifecycleService, TaskSelectionService},
};
use mockable::DefaultClock;
use rstest::fixture;
use tokio::sync::mpsc;

/// Lifecycle service over the in-memory store.
pub type TestLifecycle =
    TaskLifecycleService<InMemoryTaskRepository, RecordingInputCaptureHook, DefaultClock>;

/// Selection service over the in-memory store.
pub type TestSelection = TaskSelectionService<InMemoryTaskRepository, DefaultClock>;

/// Lifecycle and selection services sharing one store.
pub struct TaskCore {
    pub lifecycle: TestLifecycle,
    pub selection: TestSelection,
    pub hook: RecordingInputCaptureHook,
}

/// Provides services wired to a fresh in-memory store.
#[fixture]
pub fn core() -> TaskCore {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let clock = Arc::new(DefaultClock);
    let hook = RecordingInputCaptureHook::new();
    let lifecycle = TaskLifecycleService::new(
        Arc::clone(&repository),
        Arc::new(hook.clone()),
        TaskEventChannel::new(64),
        Arc::clone(&clock),
    );
    let selection = TaskSelectionService::new(repository, clock);
    TaskCore {
        lifecycle,
        selection,
        hook,
    }
}

/// Receives the next live message, failing after a short wait.
///
/// # Errors
///
/// Returns an error when nothing arrives or the queue is closed.
pub async fn next_live(receiver: &mut mpsc::Receiver<LiveMessage>) -> eyre::Result<LiveMessage> {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .map_err(|_| eyre::eyre!("timed out waiting for a live message"))?
        .ok_or_else(|| eyre::eyre!("live queue closed"))
}

/// Asserts that no live message is waiting after a brief settle period.
///
/// # Errors
///
/// Returns an error naming the unexpected message.
pub async fn expect_quiet(receiver: &mut mpsc::Receiver<LiveMessage>) -> eyre::Result<()> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    match receiver.try_recv() {
        Ok(message) => Err(eyre::eyre!("unexpected live message: {}", message.event)),
        Err(_) => Ok(()),
    }
}
