//! Input device descriptor types.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Opaque ID for an attached input device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct InputDeviceId(pub u32);

/// Describes an attached input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct InputDeviceInfo {
    pub id: InputDeviceId,
    /// Human-readable name (e.g. "Logitech K380").
    pub name: String,
    /// Plugged in from outside the device (USB, Bluetooth), as opposed to
    /// built-in keys, touchscreens, and sensors.
    pub external: bool,
}

impl std::fmt::Display for InputDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "input{}", self.0)
    }
}
