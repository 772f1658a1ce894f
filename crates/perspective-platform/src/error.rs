//! Platform collaborator errors.

use perspective_types::InputDeviceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("native call failed: {0}")]
    Native(String),

    #[error("input device not found: {0}")]
    DeviceNotFound(InputDeviceId),

    #[error("failed to change input device state: {0}")]
    Device(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("invalid platform configuration: {0}")]
    Config(String),

    #[error("backend not available on this platform")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
