//! Messages owned by a task.
//!
//! Content blocks are opaque to the lifecycle core: it guarantees ordering and
//! persistence, while interpretation belongs to the execution engine.

use super::{MessageId, ParseTaskValueError, TaskDomainError, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Written by the human operator.
    User,
    /// Written by the autonomous agent.
    Assistant,
}

impl MessageRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = ParseTaskValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(ParseTaskValueError::new("message role", value)),
        }
    }
}

/// A single block of message content.
///
/// Serialised with a `type` tag:
///
/// ```json
/// { "type": "text", "text": "Hello" }
/// { "type": "tool_use", "id": "toolu_1", "name": "computer", "input": {} }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Text content.
        text: String,
    },
    /// A tool invocation requested by the assistant.
    ToolUse {
        /// Invocation identifier used to match results.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input as JSON.
        input: Value,
    },
    /// The outcome of a tool invocation.
    ToolResult {
        /// Identifier of the matching tool use.
        tool_use_id: String,
        /// Result payload as JSON.
        content: Value,
        /// Whether the tool reported an error.
        #[serde(default)]
        is_error: bool,
    },
    /// Model reasoning.
    Thinking {
        /// Reasoning text.
        thinking: String,
    },
}

impl ContentBlock {
    /// Creates a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text of a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A message within a task's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    id: MessageId,
    task_id: TaskId,
    role: MessageRole,
    content: Vec<ContentBlock>,
    summary_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted message.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedMessageData {
    /// Persisted message identifier.
    pub id: MessageId,
    /// Owning task.
    pub task_id: TaskId,
    /// Persisted role.
    pub role: MessageRole,
    /// Persisted content blocks.
    pub content: Vec<ContentBlock>,
    /// Optional reference to a summary record.
    pub summary_id: Option<Uuid>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TaskMessage {
    /// Creates a message with the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyMessageContent`] if `content` is empty.
    pub fn new(
        task_id: TaskId,
        role: MessageRole,
        content: Vec<ContentBlock>,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        if content.is_empty() {
            return Err(TaskDomainError::EmptyMessageContent);
        }
        Ok(Self {
            id: MessageId::new(),
            task_id,
            role,
            content,
            summary_id: None,
            created_at: clock.utc(),
        })
    }

    /// Creates a single-block user text message.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyMessageText`] if `text` is blank.
    pub fn user_text(
        task_id: TaskId,
        text: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        let body = text.into();
        if body.trim().is_empty() {
            return Err(TaskDomainError::EmptyMessageText);
        }
        Self::new(task_id, MessageRole::User, vec![ContentBlock::text(body)], clock)
    }

    /// Reconstructs a message from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMessageData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            role: data.role,
            content: data.content,
            summary_id: data.summary_id,
            created_at: data.created_at,
        }
    }

    /// Links the message to a summary record.
    #[must_use]
    pub const fn with_summary_id(mut self, summary_id: Uuid) -> Self {
        self.summary_id = Some(summary_id);
        self
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the author role.
    #[must_use]
    pub const fn role(&self) -> MessageRole {
        self.role
    }

    /// Returns the content blocks in order.
    #[must_use]
    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    /// Returns the summary reference, if any.
    #[must_use]
    pub const fn summary_id(&self) -> Option<Uuid> {
        self.summary_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
