//! Live delivery of task changes to connected clients.
//!
//! [`LiveNotifier`] owns client queues and `task_{id}` room membership;
//! [`LiveEventBridge`] feeds it from the task event channel. Transports
//! (websocket, SSE) sit outside this crate and drain the client queues.

mod bridge;
mod notifier;

pub use bridge::LiveEventBridge;
pub use notifier::{
    ClientId, DEFAULT_CLIENT_QUEUE_CAPACITY, LiveError, LiveEventKind, LiveMessage, LiveNotifier,
};
