//! In-memory input-capture adapter that records calls.

use crate::task::ports::{
    InputCaptureAction, InputCaptureError, InputCaptureHook, InputCaptureResult,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Records every `start`/`stop` call and can be told to fail.
///
/// Suitable for tests that need to observe detached hook dispatch.
#[derive(Debug, Clone, Default)]
pub struct RecordingInputCaptureHook {
    calls: Arc<Mutex<Vec<InputCaptureAction>>>,
    failing: Arc<AtomicBool>,
    recorded: Arc<Notify>,
}

impl RecordingInputCaptureHook {
    /// Creates a hook that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail with a rejected status.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<InputCaptureAction> {
        self.lock_calls().clone()
    }

    /// Waits until at least `count` calls were recorded and returns them.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<InputCaptureAction> {
        loop {
            let notified = self.recorded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            notified.await;
        }
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<InputCaptureAction>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, action: InputCaptureAction) -> InputCaptureResult<()> {
        self.lock_calls().push(action);
        self.recorded.notify_waiters();
        if self.failing.load(Ordering::SeqCst) {
            return Err(InputCaptureError::Rejected {
                action,
                status: 503,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InputCaptureHook for RecordingInputCaptureHook {
    async fn start(&self) -> InputCaptureResult<()> {
        self.record(InputCaptureAction::Start)
    }

    async fn stop(&self) -> InputCaptureResult<()> {
        self.record(InputCaptureAction::Stop)
    }
}
