//! Create, read, list and delete against `PostgreSQL`.

use super::helpers::{TestDatabase, database, new_task, store};
use mockable::DefaultClock;
use tasklane::task::{
    domain::{ContentBlock, MessageRole, TaskId, TaskMessage, TaskPriority, TaskStatus},
    ports::{TaskListQuery, TaskRepository, TaskRepositoryError},
};
use eyre::ensure;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_persists_task_message_and_file(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let task = new_task("Reconcile the ledger", TaskPriority::High)?;
    store(&db.repository, &task).await?;

    let found = db
        .repository
        .find_by_id(task.id())
        .await?
        .ok_or_else(|| eyre::eyre!("stored task should be found"))?;
    ensure!(found.id() == task.id());
    ensure!(found.description() == "Reconcile the ledger");
    ensure!(found.priority() == TaskPriority::High);
    ensure!(found.status() == TaskStatus::Pending);

    let messages = db.repository.messages(task.id()).await?;
    ensure!(messages.len() == 1);
    let files = db.repository.files(task.id()).await?;
    ensure!(files.first().map(|file| file.name()) == Some("context.txt"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_task_id_is_rejected(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let task = new_task("Only once", TaskPriority::Low)?;
    store(&db.repository, &task).await?;

    let message = TaskMessage::user_text(task.id(), "again", &DefaultClock)?;
    let result = db.repository.create(&task, &message, &[]).await;

    ensure!(matches!(result, Err(TaskRepositoryError::DuplicateTask(id)) if id == task.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn messages_keep_insertion_order_and_content(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let task = new_task("Draft a reply", TaskPriority::Medium)?;
    store(&db.repository, &task).await?;

    let thinking = TaskMessage::new(
        task.id(),
        MessageRole::Assistant,
        vec![
            ContentBlock::Thinking {
                thinking: "Tone should be formal".to_owned(),
            },
            ContentBlock::text("Here is a draft."),
        ],
        &DefaultClock,
    )?;
    db.repository.append_message(&thinking).await?;
    let follow_up = TaskMessage::user_text(task.id(), "Shorter please", &DefaultClock)?;
    db.repository.append_message(&follow_up).await?;

    let messages = db.repository.messages(task.id()).await?;
    let ids: Vec<_> = messages.iter().map(TaskMessage::id).collect();
    ensure!(ids.get(1..) == Some(&[thinking.id(), follow_up.id()][..]));
    ensure!(messages.get(1).map(TaskMessage::content) == Some(thinking.content()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn append_to_missing_task_reports_not_found(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let missing = TaskId::new();
    let message = TaskMessage::user_text(missing, "hello?", &DefaultClock)?;

    let result = db.repository.append_message(&message).await;

    ensure!(matches!(result, Err(TaskRepositoryError::NotFound(id)) if id == missing));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_pages_newest_first_with_status_filter(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let mut created = Vec::new();
    for description in ["one", "two", "three"] {
        let task = new_task(description, TaskPriority::Medium)?;
        store(&db.repository, &task).await?;
        created.push(task.id());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let page = db.repository.list(TaskListQuery::new(1, 2)).await?;
    ensure!(page.total == 3);
    let listed: Vec<_> = page.tasks.iter().map(|task| task.id()).collect();
    let newest: Vec<_> = created.iter().rev().take(2).copied().collect();
    ensure!(listed == newest);

    let running = db
        .repository
        .list(TaskListQuery::default().with_status(TaskStatus::Running))
        .await?;
    ensure!(running.total == 0 && running.tasks.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_cascades_to_messages_and_files(
    database: eyre::Result<Option<TestDatabase>>,
) -> eyre::Result<()> {
    let Some(db) = database? else {
        return Ok(());
    };
    let task = new_task("Scratch work", TaskPriority::Low)?;
    store(&db.repository, &task).await?;

    ensure!(db.repository.delete(task.id()).await?);
    ensure!(!db.repository.delete(task.id()).await?);
    ensure!(db.repository.find_by_id(task.id()).await?.is_none());
    ensure!(db.repository.messages(task.id()).await?.is_empty());
    ensure!(db.repository.files(task.id()).await?.is_empty());
    Ok(())
}
