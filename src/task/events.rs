//! In-process publish point for committed task transitions.
//!
//! The lifecycle service publishes [`TaskEvent`]s here after every successful
//! write; delivery transports subscribe independently, which keeps the state
//! machine testable without any of them.

use crate::task::domain::TaskEvent;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Typed broadcast channel for task domain events.
#[derive(Debug, Clone)]
pub struct TaskEventChannel {
    sender: broadcast::Sender<TaskEvent>,
}

impl TaskEventChannel {
    /// Creates a channel that buffers up to `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: TaskEvent) {
        let name = event.name();
        let task_id = event.task_id();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, %task_id, receivers, "published task event");
            }
            Err(_) => {
                tracing::trace!(event = name, %task_id, "no task event subscribers");
            }
        }
    }

    /// Opens a new subscription that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TaskEventChannel {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
