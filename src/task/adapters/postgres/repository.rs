//! `PostgreSQL` repository implementation for task lifecycle storage.

use super::{
    models::{FileRow, MessageRow, NewFileRow, NewMessageRow, NewTaskRow, TaskRow},
    schema::{task_files, task_messages, tasks},
};
use crate::task::{
    domain::{
        AttachedFile, ContentBlock, FileId, MessageId, MessageRole, PersistedMessageData,
        PersistedTaskData, Task, TaskControl, TaskFile, TaskId, TaskKind, TaskMessage,
        TaskPriority, TaskStatus,
    },
    ports::{
        TaskListQuery, TaskPage, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
        TaskWriteGuard,
    },
};
use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, BigInt, Bool, Nullable, Text, Timestamptz, Uuid as SqlUuid};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const TASK_COLUMNS: &str = concat!(
    "id, description, kind, priority, status, control, model, scheduled_for, ",
    "queued_at, executed_at, completed_at, error, result, created_at, updated_at, ",
    "revision"
);

/// Replaces a task row only while the guard still holds.
///
/// `$15` is the expected control (NULL for any), `$16` the allowed prior
/// statuses (empty for any), `$17` whether `queued_at` must be unset and
/// `$18` the revision the write was computed from (NULL for any).
const GUARDED_UPDATE_SQL: &str = concat!(
    "UPDATE tasks SET description = $1, priority = $2, status = $3, control = $4, ",
    "model = $5, scheduled_for = $6, queued_at = $7, executed_at = $8, ",
    "completed_at = $9, error = $10, result = $11, updated_at = $12, revision = $13 ",
    "WHERE id = $14 ",
    "AND ($15::varchar IS NULL OR control = $15) ",
    "AND (cardinality($16::text[]) = 0 OR status = ANY($16)) ",
    "AND (NOT $17 OR queued_at IS NULL) ",
    "AND ($18::bigint IS NULL OR revision = $18)",
);

/// Ranks runnable tasks with explicit boolean keys so null ordering never
/// matters. Rank literals must match [`TaskPriority::rank`].
const NEXT_TASK_ORDER_SQL: &str = concat!(
    "ORDER BY (executed_at IS NOT NULL) ASC, ",
    "CASE priority WHEN 'critical' THEN 3 WHEN 'high' THEN 2 ",
    "WHEN 'medium' THEN 1 ELSE 0 END DESC, ",
    "(queued_at IS NOT NULL) ASC, created_at ASC, id ASC",
);

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn create(
        &self,
        task: &Task,
        initial_message: &TaskMessage,
        files: &[TaskFile],
    ) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let task_row = to_new_task_row(task)?;
        let message_row = to_new_message_row(initial_message)?;
        let file_rows = files
            .iter()
            .map(|file| to_new_file_row(file, task.created_at()))
            .collect::<TaskRepositoryResult<Vec<_>>>()?;

        self.run_blocking(move |connection| {
            connection
                .transaction::<_, DieselError, _>(|tx| {
                    diesel::insert_into(tasks::table)
                        .values(&task_row)
                        .execute(tx)?;
                    diesel::insert_into(task_messages::table)
                        .values(&message_row)
                        .execute(tx)?;
                    if !file_rows.is_empty() {
                        diesel::insert_into(task_files::table)
                            .values(&file_rows)
                            .execute(tx)?;
                    }
                    Ok(())
                })
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if info.constraint_name() == Some("tasks_pkey") =>
                    {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list(&self, query: TaskListQuery) -> TaskRepositoryResult<TaskPage> {
        let limit = i64::from(query.page_size());
        let offset = i64::try_from(query.offset()).map_err(TaskRepositoryError::persistence)?;

        self.run_blocking(move |connection| {
            let total = filtered_tasks(query.status())
                .count()
                .get_result::<i64>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            let rows = filtered_tasks(query.status())
                .order((tasks::created_at.desc(), tasks::id.asc()))
                .limit(limit)
                .offset(offset)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;

            Ok(TaskPage {
                tasks: rows
                    .into_iter()
                    .map(row_to_task)
                    .collect::<TaskRepositoryResult<Vec<_>>>()?,
                total: u64::try_from(total).map_err(TaskRepositoryError::invalid_persisted_data)?,
                page: query.page(),
                page_size: query.page_size(),
            })
        })
        .await
    }

    async fn update_guarded(
        &self,
        task: &Task,
        guard: &TaskWriteGuard,
    ) -> TaskRepositoryResult<bool> {
        let row = to_new_task_row(task)?;
        let expected_revision = guard
            .expected_revision()
            .map(i64::try_from)
            .transpose()
            .map_err(TaskRepositoryError::persistence)?;
        let expected_control = guard
            .expected_control()
            .map(|control| control.as_str().to_owned());
        let allowed_statuses: Vec<String> = guard
            .allowed_statuses()
            .iter()
            .map(|status| status.as_str().to_owned())
            .collect();
        let require_unqueued = guard.requires_unqueued();

        self.run_blocking(move |connection| {
            let affected = diesel::sql_query(GUARDED_UPDATE_SQL)
                .bind::<Text, _>(row.description)
                .bind::<Text, _>(row.priority)
                .bind::<Text, _>(row.status)
                .bind::<Text, _>(row.control)
                .bind::<Text, _>(row.model)
                .bind::<Nullable<Timestamptz>, _>(row.scheduled_for)
                .bind::<Nullable<Timestamptz>, _>(row.queued_at)
                .bind::<Nullable<Timestamptz>, _>(row.executed_at)
                .bind::<Nullable<Timestamptz>, _>(row.completed_at)
                .bind::<Nullable<Text>, _>(row.error)
                .bind::<Nullable<Text>, _>(row.result)
                .bind::<Timestamptz, _>(row.updated_at)
                .bind::<BigInt, _>(row.revision)
                .bind::<SqlUuid, _>(row.id)
                .bind::<Nullable<Text>, _>(expected_control)
                .bind::<Array<Text>, _>(allowed_statuses)
                .bind::<Bool, _>(require_unqueued)
                .bind::<Nullable<BigInt>, _>(expected_revision)
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(affected == 1)
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            let affected = diesel::delete(tasks::table.filter(tasks::id.eq(id.into_inner())))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(affected > 0)
        })
        .await
    }

    async fn append_message(&self, message: &TaskMessage) -> TaskRepositoryResult<()> {
        let task_id = message.task_id();
        let row = to_new_message_row(message)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(task_messages::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        TaskRepositoryError::NotFound(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn messages(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskMessage>> {
        self.run_blocking(move |connection| {
            task_messages::table
                .filter(task_messages::task_id.eq(task_id.into_inner()))
                .order(task_messages::seq.asc())
                .select(MessageRow::as_select())
                .load::<MessageRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_message)
                .collect()
        })
        .await
    }

    async fn files(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<TaskFile>> {
        self.run_blocking(move |connection| {
            task_files::table
                .filter(task_files::task_id.eq(task_id.into_inner()))
                .order((task_files::created_at.asc(), task_files::id.asc()))
                .select(FileRow::as_select())
                .load::<FileRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_file)
                .collect()
        })
        .await
    }

    async fn next_task(&self) -> TaskRepositoryResult<Option<Task>> {
        let runnable: Vec<String> = TaskStatus::RUNNABLE
            .iter()
            .map(|status| status.as_str().to_owned())
            .collect();

        self.run_blocking(move |connection| {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ANY($1) {NEXT_TASK_ORDER_SQL} LIMIT 1"
            );
            let row = diesel::sql_query(sql)
                .bind::<Array<Text>, _>(runnable)
                .get_result::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn scheduled_awaiting_queue(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            tasks::table
                .filter(tasks::scheduled_for.is_not_null())
                .filter(tasks::queued_at.is_null())
                .order((
                    tasks::scheduled_for.asc(),
                    tasks::created_at.asc(),
                    tasks::id.asc(),
                ))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?
                .into_iter()
                .map(row_to_task)
                .collect()
        })
        .await
    }
}

fn filtered_tasks(status: Option<TaskStatus>) -> tasks::BoxedQuery<'static, Pg> {
    let mut query = tasks::table.into_boxed();
    if let Some(wanted) = status {
        query = query.filter(tasks::status.eq(wanted.as_str()));
    }
    query
}

fn to_new_task_row(task: &Task) -> TaskRepositoryResult<NewTaskRow> {
    Ok(NewTaskRow {
        id: task.id().into_inner(),
        description: task.description().to_owned(),
        kind: task.kind().as_str().to_owned(),
        priority: task.priority().as_str().to_owned(),
        status: task.status().as_str().to_owned(),
        control: task.control().as_str().to_owned(),
        model: task.model().to_owned(),
        scheduled_for: task.scheduled_for(),
        queued_at: task.queued_at(),
        executed_at: task.executed_at(),
        completed_at: task.completed_at(),
        error: task.error().map(ToOwned::to_owned),
        result: task.result().map(ToOwned::to_owned),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
        revision: i64::try_from(task.revision()).map_err(TaskRepositoryError::persistence)?,
    })
}

fn to_new_message_row(message: &TaskMessage) -> TaskRepositoryResult<NewMessageRow> {
    let content =
        serde_json::to_value(message.content()).map_err(TaskRepositoryError::persistence)?;
    Ok(NewMessageRow {
        id: message.id().into_inner(),
        task_id: message.task_id().into_inner(),
        role: message.role().as_str().to_owned(),
        content,
        summary_id: message.summary_id(),
        created_at: message.created_at(),
    })
}

fn to_new_file_row(
    file: &TaskFile,
    created_at: chrono::DateTime<chrono::Utc>,
) -> TaskRepositoryResult<NewFileRow> {
    Ok(NewFileRow {
        id: file.id().into_inner(),
        task_id: file.task_id().into_inner(),
        name: file.name().to_owned(),
        media_type: file.media_type().to_owned(),
        size_bytes: i64::try_from(file.size()).map_err(TaskRepositoryError::persistence)?,
        storage_ref: file.storage_ref().to_owned(),
        created_at,
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let data = PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        kind: TaskKind::try_from(row.kind.as_str())
            .map_err(TaskRepositoryError::invalid_persisted_data)?,
        priority: TaskPriority::try_from(row.priority.as_str())
            .map_err(TaskRepositoryError::invalid_persisted_data)?,
        status: TaskStatus::try_from(row.status.as_str())
            .map_err(TaskRepositoryError::invalid_persisted_data)?,
        control: TaskControl::try_from(row.control.as_str())
            .map_err(TaskRepositoryError::invalid_persisted_data)?,
        description: row.description,
        model: row.model,
        scheduled_for: row.scheduled_for,
        queued_at: row.queued_at,
        executed_at: row.executed_at,
        completed_at: row.completed_at,
        error: row.error,
        result: row.result,
        created_at: row.created_at,
        updated_at: row.updated_at,
        revision: u64::try_from(row.revision)
            .map_err(TaskRepositoryError::invalid_persisted_data)?,
    };
    Ok(Task::from_persisted(data))
}

fn row_to_message(row: MessageRow) -> TaskRepositoryResult<TaskMessage> {
    let content = serde_json::from_value::<Vec<ContentBlock>>(row.content)
        .map_err(TaskRepositoryError::invalid_persisted_data)?;
    let role = MessageRole::try_from(row.role.as_str())
        .map_err(TaskRepositoryError::invalid_persisted_data)?;
    Ok(TaskMessage::from_persisted(PersistedMessageData {
        id: MessageId::from_uuid(row.id),
        task_id: TaskId::from_uuid(row.task_id),
        role,
        content,
        summary_id: row.summary_id,
        created_at: row.created_at,
    }))
}

fn row_to_file(row: FileRow) -> TaskRepositoryResult<TaskFile> {
    let size = u64::try_from(row.size_bytes).map_err(TaskRepositoryError::invalid_persisted_data)?;
    Ok(TaskFile::from_persisted(
        FileId::from_uuid(row.id),
        TaskId::from_uuid(row.task_id),
        AttachedFile::new(row.name, row.media_type, size, row.storage_ref),
    ))
}
