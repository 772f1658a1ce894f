//! Bounded access to the native client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use perspective_platform::{NativeClient, PlatformError};

use crate::error::ControllerError;

/// The controller's native client handle.
///
/// Created once when the controller starts and shared by the command
/// worker and the query path. Every call is bounded by `timeout`; running
/// out of time counts as a failure of that call.
#[derive(Clone)]
pub struct NativeHandle {
    client: Arc<dyn NativeClient>,
    timeout: Duration,
}

impl NativeHandle {
    pub fn new(client: Arc<dyn NativeClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn start(&self) -> Result<(), ControllerError> {
        self.bounded("start", self.client.start()).await
    }

    pub async fn stop(&self) -> Result<(), ControllerError> {
        self.bounded("stop", self.client.stop()).await
    }

    pub async fn is_running(&self) -> Result<bool, ControllerError> {
        self.bounded("is_running", self.client.is_running()).await
    }

    pub async fn set_input_enabled(&self, enabled: bool) -> Result<(), ControllerError> {
        self.bounded("set_input_enabled", self.client.set_input_enabled(enabled))
            .await
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<T, ControllerError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(ControllerError::from),
            Err(_) => Err(ControllerError::NativeTimeout {
                op,
                timeout: self.timeout,
            }),
        }
    }
}
