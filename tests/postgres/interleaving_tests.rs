//! `PostgreSQL` tests for operations whose read was outdated by another write.

use super::helpers::{TestDatabase, database, new_task, store};
use crate::test_helpers::stale_lifecycle;
use eyre::ensure;
use mockable::DefaultClock;
use rstest::rstest;
use tasklane::task::{
    domain::{PreconditionFailure, Task, TaskControl, TaskPatch, TaskPriority, TaskStatus},
    ports::{TaskRepository, TaskWriteGuard},
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

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn outdated_update_keeps_user_control_after_take_over(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let (lifecycle, repository) = stale_lifecycle(db.repository.clone());
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
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn outdated_queue_claim_keeps_running_task_running(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let (lifecycle, repository) = stale_lifecycle(db.repository.clone());
    let created = lifecycle
        .create(CreateTaskRequest::new("Reconcile the invoices"))
        .await?;
    let before_start = lifecycle.get(created.id()).await?;
    lifecycle
        .update(created.id(), TaskPatch::new().with_status(TaskStatus::Running))
        .await?;

    repository.serve_once(before_start);
    let result = lifecycle.mark_queued(created.id()).await;

    ensure!(lost_to_concurrent_write(&result), "got {result:?}");
    let stored = lifecycle.get(created.id()).await?;
    ensure!(stored.status() == TaskStatus::Running);
    ensure!(stored.executed_at().is_some());
    ensure!(stored.queued_at().is_none());

    let claimed = lifecycle.mark_queued(created.id()).await?;
    ensure!(claimed.queued_at().is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn revision_guard_rejects_write_from_older_read(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let task = new_task("Sort the inbox", TaskPriority::Medium)?;
    store(&db.repository, &task).await?;

    let mut first = task.clone();
    first.take_over(&DefaultClock)?;
    let first_read = first.advance_revision();
    ensure!(
        db.repository
            .update_guarded(&first, &TaskWriteGuard::active().at_revision(first_read))
            .await?
    );

    let mut second = task;
    second.mark_queued(&DefaultClock)?;
    let second_read = second.advance_revision();
    ensure!(
        !db.repository
            .update_guarded(&second, &TaskWriteGuard::active().at_revision(second_read))
            .await?
    );

    let stored = db
        .repository
        .find_by_id(first.id())
        .await?
        .ok_or_else(|| eyre::eyre!("task should exist"))?;
    ensure!(stored.control() == TaskControl::User);
    ensure!(stored.queued_at().is_none());
    ensure!(stored.revision() == 1);
    Ok(())
}
