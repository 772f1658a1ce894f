//! Display descriptor types.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Opaque ID for a display known to the platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct DisplayId(pub u32);

/// Describes an attached display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DisplayInfo {
    pub id: DisplayId,
    /// Connector or panel name (e.g. "HDMI-A-1").
    pub name: String,
    /// Can host a separate, publicly presented session (an external monitor).
    /// The built-in panel is never a presentation display.
    pub presentation: bool,
}

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "display{}", self.0)
    }
}
