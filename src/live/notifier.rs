//! Room-scoped fan-out of task changes to connected clients.

use crate::task::domain::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Default number of messages buffered per client.
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 64;

/// Identifier of a connected live client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new random client identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire name of a live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    /// A task was created; delivered to every client.
    TaskCreated,
    /// A task changed; delivered to the task's room.
    TaskUpdated,
    /// A task was deleted; delivered to every client.
    TaskDeleted,
    /// A message was appended; delivered to the task's room.
    NewMessage,
}

impl LiveEventKind {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskUpdated => "task_updated",
            Self::TaskDeleted => "task_deleted",
            Self::NewMessage => "new_message",
        }
    }

    /// Returns whether the event goes to every client rather than one room.
    #[must_use]
    pub const fn is_global(self) -> bool {
        matches!(self, Self::TaskCreated | Self::TaskDeleted)
    }
}

impl fmt::Display for LiveEventKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Message delivered to a live client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    /// Event name.
    pub event: LiveEventKind,
    /// Room the message was addressed to; `None` for global events.
    pub room: Option<String>,
    /// Task the event concerns.
    pub task_id: TaskId,
    /// Event body.
    pub payload: Value,
}

impl LiveMessage {
    /// Serializes the message for a text transport.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be encoded.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Errors returned by [`LiveNotifier`] membership operations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LiveError {
    /// The client is not connected.
    #[error("unknown live client: {0}")]
    UnknownClient(ClientId),
}

#[derive(Debug, Default)]
struct NotifierState {
    clients: HashMap<ClientId, mpsc::Sender<LiveMessage>>,
    rooms: HashMap<TaskId, HashSet<ClientId>>,
}

impl NotifierState {
    fn remove_client(&mut self, client: ClientId) -> bool {
        if self.clients.remove(&client).is_none() {
            return false;
        }
        self.rooms.retain(|_, members| {
            members.remove(&client);
            !members.is_empty()
        });
        true
    }
}

/// Registry of connected clients and their room memberships.
///
/// Delivery is at-most-once: a full or closed client queue drops the message.
/// Clients that reconnect re-read state through the task read path.
#[derive(Debug, Clone)]
pub struct LiveNotifier {
    state: Arc<RwLock<NotifierState>>,
    queue_capacity: usize,
}

impl LiveNotifier {
    /// Creates a notifier whose clients buffer up to `queue_capacity` messages.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: Arc::default(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a client and returns the receiving end of its queue.
    #[must_use]
    pub fn connect(&self) -> (ClientId, mpsc::Receiver<LiveMessage>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let client = ClientId::new();
        self.write().clients.insert(client, sender);
        tracing::debug!(%client, "live client connected");
        (client, receiver)
    }

    /// Removes a client and all of its room memberships.
    ///
    /// Returns whether the client was connected.
    #[must_use]
    pub fn disconnect(&self, client: ClientId) -> bool {
        let removed = self.write().remove_client(client);
        if removed {
            tracing::debug!(%client, "live client disconnected");
        }
        removed
    }

    /// Adds `client` to the room of `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::UnknownClient`] if the client is not connected.
    pub fn join(&self, task_id: TaskId, client: ClientId) -> Result<(), LiveError> {
        let mut state = self.write();
        if !state.clients.contains_key(&client) {
            return Err(LiveError::UnknownClient(client));
        }
        state.rooms.entry(task_id).or_default().insert(client);
        tracing::debug!(%client, room = %task_id.room_name(), "joined room");
        Ok(())
    }

    /// Removes `client` from the room of `task_id`.
    ///
    /// Returns whether the client was a member.
    #[must_use]
    pub fn leave(&self, task_id: TaskId, client: ClientId) -> bool {
        let mut state = self.write();
        let Some(members) = state.rooms.get_mut(&task_id) else {
            return false;
        };
        let removed = members.remove(&client);
        if members.is_empty() {
            state.rooms.remove(&task_id);
        }
        removed
    }

    /// Delivers an event to the task's room, or to every client for global
    /// kinds.
    ///
    /// Returns the number of clients the message was queued for.
    #[must_use]
    pub fn emit(&self, event: LiveEventKind, task_id: TaskId, payload: Value) -> usize {
        let room = task_id.room_name();
        let message = LiveMessage {
            event,
            room: (!event.is_global()).then(|| room.clone()),
            task_id,
            payload,
        };

        let recipients: Vec<(ClientId, mpsc::Sender<LiveMessage>)> = {
            let state = self.read();
            if event.is_global() {
                state
                    .clients
                    .iter()
                    .map(|(client, sender)| (*client, sender.clone()))
                    .collect()
            } else {
                state
                    .rooms
                    .get(&task_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|client| {
                        state
                            .clients
                            .get(client)
                            .map(|sender| (*client, sender.clone()))
                    })
                    .collect()
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (client, sender) in recipients {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%client, %event, %room, "client queue full, dropping live event");
                }
                Err(TrySendError::Closed(_)) => closed.push(client),
            }
        }

        if !closed.is_empty() {
            let mut state = self.write();
            for client in &closed {
                state.remove_client(*client);
            }
            tracing::debug!(pruned = closed.len(), "removed closed live clients");
        }

        tracing::debug!(%event, %room, delivered, "live event emitted");
        delivered
    }

    /// Returns the members of the task's room, sorted.
    #[must_use]
    pub fn room_members(&self, task_id: TaskId) -> Vec<ClientId> {
        let mut members: Vec<ClientId> = self
            .read()
            .rooms
            .get(&task_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Returns the number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.read().clients.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, NotifierState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NotifierState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LiveNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_QUEUE_CAPACITY)
    }
}
