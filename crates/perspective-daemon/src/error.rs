//! Controller errors.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("controller is not running")]
    NotRunning,

    #[error("native {op} timed out after {timeout:?}")]
    NativeTimeout { op: &'static str, timeout: Duration },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] perspective_protocol::ProtocolError),

    #[error("platform error: {0}")]
    Platform(#[from] perspective_platform::PlatformError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
