//! Live delivery through a fully wired in-memory runtime.

use super::helpers::{expect_quiet, next_live};
use tasklane::config::TaskLaneConfig;
use tasklane::live::LiveEventKind;
use tasklane::runtime::TaskRuntime;
use tasklane::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{TaskPatch, TaskStatus},
    services::{CreateTaskRequest, TaskLifecycleError},
};
use eyre::ensure;
use rstest::{fixture, rstest};

#[fixture]
fn config() -> TaskLaneConfig {
    TaskLaneConfig::default()
}

fn start(config: &TaskLaneConfig) -> eyre::Result<TaskRuntime<InMemoryTaskRepository>> {
    Ok(TaskRuntime::in_memory(config)?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn each_room_operation_yields_one_room_event(config: TaskLaneConfig) -> eyre::Result<()> {
    let runtime = start(&config)?;
    let (client, mut inbox) = runtime.notifier().connect();
    let task = runtime
        .lifecycle()
        .create(CreateTaskRequest::new("Watch me"))
        .await?;
    ensure!(next_live(&mut inbox).await?.event == LiveEventKind::TaskCreated);
    runtime.notifier().join(task.id(), client)?;
    let id = task.id();

    runtime
        .lifecycle()
        .update(id, TaskPatch::new().with_status(TaskStatus::Running))
        .await?;
    ensure!(next_live(&mut inbox).await?.event == LiveEventKind::TaskUpdated);

    runtime.lifecycle().take_over(id).await?;
    ensure!(next_live(&mut inbox).await?.event == LiveEventKind::TaskUpdated);

    runtime.lifecycle().add_message(id, "Over to you").await?;
    let message = next_live(&mut inbox).await?;
    ensure!(message.event == LiveEventKind::NewMessage);
    ensure!(message.room.as_deref() == Some(id.room_name().as_str()));

    runtime.lifecycle().resume(id).await?;
    ensure!(next_live(&mut inbox).await?.event == LiveEventKind::TaskUpdated);

    runtime.lifecycle().cancel(id).await?;
    let cancelled = next_live(&mut inbox).await?;
    ensure!(cancelled.event == LiveEventKind::TaskUpdated);
    ensure!(cancelled.payload["status"] == "cancelled");

    expect_quiet(&mut inbox).await?;
    runtime.shutdown();
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn needs_help_update_yields_single_room_event(config: TaskLaneConfig) -> eyre::Result<()> {
    let runtime = start(&config)?;
    let task = runtime
        .lifecycle()
        .create(CreateTaskRequest::new("Captcha ahead"))
        .await?;
    runtime
        .lifecycle()
        .update(task.id(), TaskPatch::new().with_status(TaskStatus::Running))
        .await?;
    let (client, mut inbox) = runtime.notifier().connect();
    runtime.notifier().join(task.id(), client)?;

    runtime
        .lifecycle()
        .update(task.id(), TaskPatch::new().with_status(TaskStatus::NeedsHelp))
        .await?;

    let update = next_live(&mut inbox).await?;
    ensure!(update.event == LiveEventKind::TaskUpdated);
    ensure!(update.payload["status"] == "needs_help");
    ensure!(update.payload["control"] == "user");
    expect_quiet(&mut inbox).await?;
    runtime.shutdown();
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn room_events_skip_non_members(config: TaskLaneConfig) -> eyre::Result<()> {
    let runtime = start(&config)?;
    let task = runtime
        .lifecycle()
        .create(CreateTaskRequest::new("Private"))
        .await?;
    let (_outsider, mut outsider_inbox) = runtime.notifier().connect();

    runtime.lifecycle().add_message(task.id(), "Only for the room").await?;

    expect_quiet(&mut outsider_inbox).await?;
    runtime.shutdown();
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_reaches_every_client(config: TaskLaneConfig) -> eyre::Result<()> {
    let runtime = start(&config)?;
    let task = runtime
        .lifecycle()
        .create(CreateTaskRequest::new("Short lived"))
        .await?;
    let (member, mut member_inbox) = runtime.notifier().connect();
    let (_bystander, mut bystander_inbox) = runtime.notifier().connect();
    runtime.notifier().join(task.id(), member)?;

    runtime.lifecycle().delete(task.id()).await?;

    for inbox in [&mut member_inbox, &mut bystander_inbox] {
        let message = next_live(inbox).await?;
        ensure!(message.event == LiveEventKind::TaskDeleted);
        ensure!(message.room.is_none());
        ensure!(message.task_id == task.id());
    }
    ensure!(matches!(
        runtime.lifecycle().get(task.id()).await,
        Err(TaskLifecycleError::NotFound(_))
    ));
    runtime.shutdown();
    Ok(())
}

#[test]
fn runtime_requires_tokio() {
    let result = TaskRuntime::in_memory(&TaskLaneConfig::default());
    assert!(matches!(
        result,
        Err(tasklane::runtime::RuntimeError::NoAsyncRuntime)
    ));
}
