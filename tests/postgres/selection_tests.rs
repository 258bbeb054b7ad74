//! Next-task ranking and scheduled-task promotion in SQL.

use super::helpers::{TestDatabase, database, new_task, store};
use chrono::{Duration, Utc};
use mockable::DefaultClock;
use tasklane::task::{
    domain::{NewTaskParams, Task, TaskKind, TaskPatch, TaskPriority, TaskStatus},
    ports::{TaskRepository, TaskWriteGuard},
};
use eyre::ensure;
use rstest::rstest;

async fn start(db: &TestDatabase, task: &mut Task) -> eyre::Result<()> {
    task.apply_patch(&TaskPatch::new().with_status(TaskStatus::Running), &DefaultClock)?;
    ensure!(db.repository.update_guarded(task, &TaskWriteGuard::any()).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ranking_prefers_fresh_then_priority_then_unqueued(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let mut started = new_task("Started critical", TaskPriority::Critical)?;
    store(&db.repository, &started).await?;
    start(&db, &mut started).await?;

    let mut queued_high = new_task("Queued high", TaskPriority::High)?;
    store(&db.repository, &queued_high).await?;
    queued_high.mark_queued(&DefaultClock)?;
    ensure!(db.repository.update_guarded(&queued_high, &TaskWriteGuard::any()).await?);

    let fresh_high = new_task("Fresh high", TaskPriority::High)?;
    store(&db.repository, &fresh_high).await?;
    let fresh_low = new_task("Fresh low", TaskPriority::Low)?;
    store(&db.repository, &fresh_low).await?;

    let next = db.repository.next_task().await?;
    ensure!(next.map(|task| task.id()) == Some(fresh_high.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn oldest_task_wins_remaining_ties(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let older = new_task("Older", TaskPriority::Medium)?;
    store(&db.repository, &older).await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = new_task("Newer", TaskPriority::Medium)?;
    store(&db.repository, &newer).await?;

    let next = db.repository.next_task().await?;
    ensure!(next.map(|task| task.id()) == Some(older.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_pending_and_running_are_candidates(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let mut cancelled = new_task("Cancelled", TaskPriority::Critical)?;
    store(&db.repository, &cancelled).await?;
    cancelled.cancel(&DefaultClock)?;
    ensure!(db.repository.update_guarded(&cancelled, &TaskWriteGuard::any()).await?);

    ensure!(db.repository.next_task().await?.is_none());

    let mut running = new_task("Running", TaskPriority::Low)?;
    store(&db.repository, &running).await?;
    start(&db, &mut running).await?;
    ensure!(db.repository.next_task().await?.map(|task| task.id()) == Some(running.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn promoter_orders_by_due_time_and_skips_queued(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let now = Utc::now();
    let mut scheduled = Vec::new();
    for (description, offset) in [("Late", 90), ("Early", 10), ("Middle", 45)] {
        let task = Task::new(
            NewTaskParams {
                description: description.to_owned(),
                kind: TaskKind::Scheduled,
                priority: TaskPriority::Medium,
                model: "default".to_owned(),
                scheduled_for: Some(now + Duration::minutes(offset)),
            },
            &DefaultClock,
        )?;
        store(&db.repository, &task).await?;
        scheduled.push(task);
    }
    store(&db.repository, &new_task("Immediate", TaskPriority::High)?).await?;

    let awaiting: Vec<String> = db
        .repository
        .scheduled_awaiting_queue()
        .await?
        .iter()
        .map(|task| task.description().to_owned())
        .collect();
    ensure!(awaiting == ["Early", "Middle", "Late"]);

    let mut middle = scheduled
        .into_iter()
        .find(|task| task.description() == "Middle")
        .ok_or_else(|| eyre::eyre!("middle task should exist"))?;
    middle.mark_queued(&DefaultClock)?;
    ensure!(
        db.repository
            .update_guarded(&middle, &TaskWriteGuard::active().unqueued())
            .await?
    );

    let remaining: Vec<String> = db
        .repository
        .scheduled_awaiting_queue()
        .await?
        .iter()
        .map(|task| task.description().to_owned())
        .collect();
    ensure!(remaining == ["Early", "Late"]);
    Ok(())
}
