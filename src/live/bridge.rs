//! Forwards committed task events to the live notifier.

use super::notifier::{LiveEventKind, LiveNotifier};
use crate::task::domain::{TaskEvent, TaskId};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Subscribes to the task event channel and emits delivery-facing events.
///
/// Domain-only events (completed, failed, resumed, taken over, cancelled)
/// are not forwarded; their state change already arrives as `task_updated`.
#[derive(Debug)]
pub struct LiveEventBridge {
    receiver: broadcast::Receiver<TaskEvent>,
    notifier: LiveNotifier,
}

impl LiveEventBridge {
    /// Creates a bridge over an existing subscription.
    #[must_use]
    pub const fn new(receiver: broadcast::Receiver<TaskEvent>, notifier: LiveNotifier) -> Self {
        Self { receiver, notifier }
    }

    /// Runs the bridge on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Forwards events until every publisher is dropped.
    #[tracing::instrument(skip_all, name = "live_event_bridge")]
    pub async fn run(mut self) {
        loop {
            match self.receiver.recv().await {
                Ok(event) => self.forward(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "live event bridge lagged; clients should refetch");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("task event channel closed, stopping live event bridge");
                    break;
                }
            }
        }
    }

    fn forward(&self, event: &TaskEvent) {
        let Some((kind, task_id, payload)) = live_event(event) else {
            tracing::trace!(event = event.name(), "domain-only event not forwarded");
            return;
        };
        match payload {
            Ok(body) => {
                let delivered = self.notifier.emit(kind, task_id, body);
                tracing::trace!(%kind, %task_id, delivered, "forwarded task event");
            }
            Err(err) => {
                tracing::warn!(%kind, %task_id, error = %err, "failed to encode live event payload");
            }
        }
    }
}

type LivePayload = Result<Value, serde_json::Error>;

/// Maps a domain event to its live form, or `None` for domain-only events.
fn live_event(event: &TaskEvent) -> Option<(LiveEventKind, TaskId, LivePayload)> {
    match event {
        TaskEvent::Created { task } => Some((
            LiveEventKind::TaskCreated,
            task.id(),
            serde_json::to_value(task),
        )),
        TaskEvent::Updated { task } => Some((
            LiveEventKind::TaskUpdated,
            task.id(),
            serde_json::to_value(task),
        )),
        TaskEvent::Deleted { task_id } => Some((
            LiveEventKind::TaskDeleted,
            *task_id,
            Ok(serde_json::json!({ "task_id": task_id })),
        )),
        TaskEvent::MessageAdded { message } => Some((
            LiveEventKind::NewMessage,
            message.task_id(),
            serde_json::to_value(message),
        )),
        TaskEvent::Completed { .. }
        | TaskEvent::Failed { .. }
        | TaskEvent::Resumed { .. }
        | TaskEvent::TakenOver { .. }
        | TaskEvent::Cancelled { .. } => None,
    }
}
