//! Diesel row models for task persistence.

use super::schema::{task_files, task_messages, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Free-text description.
    pub description: String,
    /// Task kind.
    pub kind: String,
    /// Priority.
    pub priority: String,
    /// Lifecycle status.
    pub status: String,
    /// Control owner.
    pub control: String,
    /// Model identifier.
    pub model: String,
    /// Due time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Claim time.
    pub queued_at: Option<DateTime<Utc>>,
    /// First-run time.
    pub executed_at: Option<DateTime<Utc>>,
    /// Terminal time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure description.
    pub error: Option<String>,
    /// Result summary.
    pub result: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Committed write counter.
    pub revision: i64,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Free-text description.
    pub description: String,
    /// Task kind.
    pub kind: String,
    /// Priority.
    pub priority: String,
    /// Lifecycle status.
    pub status: String,
    /// Control owner.
    pub control: String,
    /// Model identifier.
    pub model: String,
    /// Due time.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Claim time.
    pub queued_at: Option<DateTime<Utc>>,
    /// First-run time.
    pub executed_at: Option<DateTime<Utc>>,
    /// Terminal time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure description.
    pub error: Option<String>,
    /// Result summary.
    pub result: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Committed write counter.
    pub revision: i64,
}

/// Query result row for task messages.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MessageRow {
    /// Insertion order.
    pub seq: i64,
    /// Message identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Message role.
    pub role: String,
    /// Content blocks as JSON.
    pub content: Value,
    /// Optional summary reference.
    pub summary_id: Option<uuid::Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for task messages; `seq` is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_messages)]
pub struct NewMessageRow {
    /// Message identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Message role.
    pub role: String,
    /// Content blocks as JSON.
    pub content: Value,
    /// Optional summary reference.
    pub summary_id: Option<uuid::Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Query result row for task files.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FileRow {
    /// File identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Media type.
    pub media_type: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Pointer into external storage.
    pub storage_ref: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for task files.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_files)]
pub struct NewFileRow {
    /// File identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Media type.
    pub media_type: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Pointer into external storage.
    pub storage_ref: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
