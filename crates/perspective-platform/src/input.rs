//! Fallback input backend.

use perspective_types::{InputDeviceId, InputDeviceInfo};

use crate::error::PlatformError;
use crate::InputDevices;

/// [`InputDevices`] for hosts without input device control: reports no
/// devices and refuses to toggle any.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInputDevices;

impl InputDevices for NoInputDevices {
    fn devices(&self) -> Vec<InputDeviceInfo> {
        Vec::new()
    }

    fn set_enabled(&self, id: InputDeviceId, _enabled: bool) -> Result<(), PlatformError> {
        Err(PlatformError::DeviceNotFound(id))
    }
}
