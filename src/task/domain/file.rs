//! File records attached to a task.
//!
//! The bytes live in external storage; the task store only keeps the pointer.

use super::{FileId, TaskDomainError, TaskId};
use serde::{Deserialize, Serialize};

/// Metadata for a file supplied when a task is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    /// Display name.
    pub name: String,
    /// Media type, for example `application/pdf`.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Opaque pointer into external storage.
    pub storage_ref: String,
}

impl AttachedFile {
    /// Creates attachment metadata.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        size: u64,
        storage_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size,
            storage_ref: storage_ref.into(),
        }
    }

    /// Note added to the initial task message for this attachment.
    #[must_use]
    pub fn note(&self) -> String {
        format!(
            "Attached file: {} ({}, {} bytes)",
            self.name, self.media_type, self.size
        )
    }
}

/// A file linked to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
    id: FileId,
    task_id: TaskId,
    name: String,
    media_type: String,
    size: u64,
    storage_ref: String,
}

impl TaskFile {
    /// Creates a file record for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyFileName`] when the name is blank.
    pub fn attach(task_id: TaskId, file: AttachedFile) -> Result<Self, TaskDomainError> {
        let name = file.name.trim();
        if name.is_empty() {
            return Err(TaskDomainError::EmptyFileName);
        }
        Ok(Self {
            id: FileId::new(),
            task_id,
            name: name.to_owned(),
            media_type: file.media_type,
            size: file.size,
            storage_ref: file.storage_ref,
        })
    }

    /// Reconstructs a file record from persisted storage.
    #[must_use]
    pub fn from_persisted(id: FileId, task_id: TaskId, file: AttachedFile) -> Self {
        Self {
            id,
            task_id,
            name: file.name,
            media_type: file.media_type,
            size: file.size,
            storage_ref: file.storage_ref,
        }
    }

    /// Returns the file identifier.
    #[must_use]
    pub const fn id(&self) -> FileId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the external storage pointer.
    #[must_use]
    pub fn storage_ref(&self) -> &str {
        &self.storage_ref
    }
}
