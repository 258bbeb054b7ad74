//! In-memory tests for operations whose read was outdated by another write.

use crate::test_helpers::stale_lifecycle;
use eyre::ensure;
use tasklane::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{PreconditionFailure, Task, TaskControl, TaskPatch, TaskStatus},
    services::{CreateTaskRequest, TaskLifecycleError},
};

fn lost_to_concurrent_write(result: &Result<Task, TaskLifecycleError>) -> bool {
    matches!(
        result,
        Err(TaskLifecycleError::PreconditionFailed {
            failure: PreconditionFailure::ConcurrentModification,
            ..
        })
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn outdated_update_keeps_user_control_after_take_over() -> eyre::Result<()> {
    let (lifecycle, repository) = stale_lifecycle(InMemoryTaskRepository::new());
    let created = lifecycle
        .create(CreateTaskRequest::new("Draft the release notes"))
        .await?;
    let before_take_over = lifecycle.get(created.id()).await?;
    lifecycle.take_over(created.id()).await?;

    repository.serve_once(before_take_over);
    let result = lifecycle
        .update(
            created.id(),
            TaskPatch::new().with_description("Draft the changelog"),
        )
        .await;

    ensure!(lost_to_concurrent_write(&result), "got {result:?}");
    let stored = lifecycle.get(created.id()).await?;
    ensure!(stored.control() == TaskControl::User);
    ensure!(stored.description() == "Draft the release notes");
    ensure!(stored.revision() == 1, "only the take-over was written");

    let retried = lifecycle
        .update(
            created.id(),
            TaskPatch::new().with_description("Draft the changelog"),
        )
        .await?;
    ensure!(retried.control() == TaskControl::User);
    ensure!(lifecycle.get(created.id()).await?.description() == "Draft the changelog");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn outdated_queue_claim_keeps_running_task_running() -> eyre::Result<()> {
    let (lifecycle, repository) = stale_lifecycle(InMemoryTaskRepository::new());
    let created = lifecycle
        .create(CreateTaskRequest::new("Reconcile the invoices"))
        .await?;
    let before_start = lifecycle.get(created.id()).await?;
    let running = lifecycle
        .update(created.id(), TaskPatch::new().with_status(TaskStatus::Running))
        .await?;

    repository.serve_once(before_start);
    let result = lifecycle.mark_queued(created.id()).await;

    ensure!(lost_to_concurrent_write(&result), "got {result:?}");
    let stored = lifecycle.get(created.id()).await?;
    ensure!(stored.status() == TaskStatus::Running);
    ensure!(stored.executed_at().is_some());
    ensure!(stored.executed_at() == running.executed_at());
    ensure!(stored.queued_at().is_none());

    let claimed = lifecycle.mark_queued(created.id()).await?;
    ensure!(claimed.status() == TaskStatus::Running);
    ensure!(claimed.queued_at().is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn outdated_cancel_reports_terminal_status() -> eyre::Result<()> {
    let (lifecycle, repository) = stale_lifecycle(InMemoryTaskRepository::new());
    let created = lifecycle
        .create(CreateTaskRequest::new("Archive the old tickets"))
        .await?;
    let before_completion = lifecycle.get(created.id()).await?;
    for status in [TaskStatus::Running, TaskStatus::Completed] {
        lifecycle
            .update(created.id(), TaskPatch::new().with_status(status))
            .await?;
    }

    repository.serve_once(before_completion);
    let result = lifecycle.cancel(created.id()).await;

    ensure!(
        matches!(
            result,
            Err(TaskLifecycleError::PreconditionFailed {
                failure: PreconditionFailure::AlreadyTerminal(TaskStatus::Completed),
                ..
            })
        ),
        "got {result:?}"
    );
    ensure!(lifecycle.get(created.id()).await?.status() == TaskStatus::Completed);
    Ok(())
}
