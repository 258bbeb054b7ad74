//! Diesel schema for task lifecycle persistence.

diesel::table! {
    /// Task records.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Free-text description.
        description -> Text,
        /// Task kind.
        #[max_length = 20]
        kind -> Varchar,
        /// Priority.
        #[max_length = 20]
        priority -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Control owner.
        #[max_length = 20]
        control -> Varchar,
        /// Model identifier.
        #[max_length = 255]
        model -> Varchar,
        /// Due time for scheduled tasks.
        scheduled_for -> Nullable<Timestamptz>,
        /// Time an execution loop claimed the task.
        queued_at -> Nullable<Timestamptz>,
        /// Time of the first run.
        executed_at -> Nullable<Timestamptz>,
        /// Time the task reached a terminal status.
        completed_at -> Nullable<Timestamptz>,
        /// Failure description.
        error -> Nullable<Text>,
        /// Result summary.
        result -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Committed write counter.
        revision -> Int8,
    }
}

diesel::table! {
    /// Messages owned by a task, ordered by `seq`.
    task_messages (id) {
        /// Insertion order.
        seq -> Int8,
        /// Message identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Message role.
        #[max_length = 20]
        role -> Varchar,
        /// Content blocks.
        content -> Jsonb,
        /// Optional summary reference.
        summary_id -> Nullable<Uuid>,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// File pointers owned by a task.
    task_files (id) {
        /// File identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Display name.
        name -> Text,
        /// Media type.
        #[max_length = 255]
        media_type -> Varchar,
        /// Size in bytes.
        size_bytes -> Int8,
        /// Pointer into external storage.
        storage_ref -> Text,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(task_messages -> tasks (task_id));
diesel::joinable!(task_files -> tasks (task_id));
diesel::allow_tables_to_appear_in_same_query!(tasks, task_messages, task_files);
