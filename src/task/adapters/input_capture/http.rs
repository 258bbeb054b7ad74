//! HTTP adapter for the input-capture collaborator.

use crate::task::ports::{
    InputCaptureAction, InputCaptureError, InputCaptureHook, InputCaptureResult,
};
use async_trait::async_trait;
use std::time::Duration;

/// Calls `POST {base_url}/start` and `POST {base_url}/stop`.
#[derive(Debug, Clone)]
pub struct HttpInputCaptureHook {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInputCaptureHook {
    /// Creates an adapter for the collaborator at `base_url`.
    ///
    /// Each request is bounded by `timeout`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let raw = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: raw.trim_end_matches('/').to_owned(),
            timeout,
        }
    }

    /// Returns the endpoint for `action`.
    #[must_use]
    pub fn endpoint(&self, action: InputCaptureAction) -> String {
        format!("{}/{}", self.base_url, action.as_str())
    }

    async fn send(&self, action: InputCaptureAction) -> InputCaptureResult<()> {
        let response = self
            .client
            .post(self.endpoint(action))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    InputCaptureError::TimedOut {
                        action,
                        timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    InputCaptureError::transport(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InputCaptureError::Rejected {
                action,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InputCaptureHook for HttpInputCaptureHook {
    async fn start(&self) -> InputCaptureResult<()> {
        self.send(InputCaptureAction::Start).await
    }

    async fn stop(&self) -> InputCaptureResult<()> {
        self.send(InputCaptureAction::Stop).await
    }
}
