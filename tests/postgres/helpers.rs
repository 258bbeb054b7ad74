//! Shared test helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use rstest::fixture;
use tasklane::task::{
    adapters::postgres::PostgresTaskRepository,
    domain::{AttachedFile, NewTaskParams, Task, TaskFile, TaskKind, TaskMessage, TaskPriority},
    ports::TaskRepository,
};
use uuid::Uuid;

/// Environment variable naming the server used by these tests.
pub const DATABASE_URL_ENV: &str = "TASKLANE_TEST_DATABASE_URL";

/// SQL creating the task tables.
pub const CREATE_TASKS_SQL: &str =
    include_str!("../../migrations/2026-03-01-000000_create_tasks/up.sql");

/// A migrated schema private to one test.
pub struct TestDatabase {
    /// Repository whose connections resolve tables in the private schema.
    pub repository: PostgresTaskRepository,
    admin_url: String,
    schema: String,
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let statement = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema);
        match PgConnection::establish(&self.admin_url) {
            Ok(mut connection) => {
                if let Err(err) = connection.batch_execute(&statement) {
                    tracing::warn!(schema = %self.schema, error = %err, "failed to drop test schema");
                }
            }
            Err(err) => {
                tracing::warn!(schema = %self.schema, error = %err, "failed to reconnect for cleanup");
            }
        }
    }
}

/// Provides a freshly migrated database, or `None` when no server is
/// configured.
///
/// # Errors
///
/// Returns an error when the server is configured but cannot be prepared.
#[fixture]
pub fn database() -> eyre::Result<Option<TestDatabase>> {
    let Ok(admin_url) = std::env::var(DATABASE_URL_ENV) else {
        return Ok(None);
    };
    let schema = format!("tasklane_test_{}", Uuid::new_v4().simple());

    let mut admin = PgConnection::establish(&admin_url)?;
    admin.batch_execute(&format!(
        "CREATE SCHEMA {schema}; SET search_path TO {schema}; {CREATE_TASKS_SQL}"
    ))?;

    let scoped_url = with_search_path(&admin_url, &schema);
    let pool = Pool::builder()
        .max_size(4)
        .build(ConnectionManager::<PgConnection>::new(scoped_url))?;

    Ok(Some(TestDatabase {
        repository: PostgresTaskRepository::new(pool),
        admin_url,
        schema,
    }))
}

/// Appends a libpq `options` parameter selecting `schema`.
fn with_search_path(url: &str, schema: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}options=-csearch_path%3D{schema}")
}

/// Builds a pending task with the given priority.
///
/// # Errors
///
/// Returns an error when the task fails validation.
pub fn new_task(description: &str, priority: TaskPriority) -> eyre::Result<Task> {
    Ok(Task::new(
        NewTaskParams {
            description: description.to_owned(),
            kind: TaskKind::Immediate,
            priority,
            model: "default".to_owned(),
            scheduled_for: None,
        },
        &DefaultClock,
    )?)
}

/// Stores `task` with a description message and one attached file.
///
/// # Errors
///
/// Returns an error when message construction or the insert fails.
pub async fn store(repository: &PostgresTaskRepository, task: &Task) -> eyre::Result<()> {
    let message = TaskMessage::user_text(task.id(), task.description(), &DefaultClock)?;
    let file = TaskFile::attach(
        task.id(),
        AttachedFile::new("context.txt", "text/plain", 64, "files/context.txt"),
    )?;
    repository.create(task, &message, &[file]).await?;
    Ok(())
}
