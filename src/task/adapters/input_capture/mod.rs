//! Input-capture hook adapters.

mod http;
mod recording;

pub use http::HttpInputCaptureHook;
pub use recording::RecordingInputCaptureHook;

use crate::task::ports::{InputCaptureHook, InputCaptureResult};
use async_trait::async_trait;

/// Hook selected from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredInputCaptureHook {
    /// Calls an HTTP collaborator.
    Http(HttpInputCaptureHook),
    /// No collaborator configured; every call succeeds without effect.
    Disabled,
}

#[async_trait]
impl InputCaptureHook for ConfiguredInputCaptureHook {
    async fn start(&self) -> InputCaptureResult<()> {
        match self {
            Self::Http(hook) => hook.start().await,
            Self::Disabled => {
                tracing::trace!("input capture disabled, skipping start");
                Ok(())
            }
        }
    }

    async fn stop(&self) -> InputCaptureResult<()> {
        match self {
            Self::Http(hook) => hook.stop().await,
            Self::Disabled => {
                tracing::trace!("input capture disabled, skipping stop");
                Ok(())
            }
        }
    }
}
