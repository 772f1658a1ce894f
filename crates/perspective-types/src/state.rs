//! Perspective lifecycle state.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a perspective.
///
/// `Stopped` and `Running` are rest states. `Starting` and `Stopping` are
/// only ever entered by the controller while a native call is in flight.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub enum PerspectiveState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// A numeric state code outside `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown perspective state code {0}")]
pub struct InvalidStateCode(pub u8);

impl PerspectiveState {
    /// Numeric code used by clients that speak the legacy integer encoding.
    pub fn code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    /// Whether this is a rest state (`Stopped` or `Running`).
    pub fn is_stable(self) -> bool {
        matches!(self, Self::Stopped | Self::Running)
    }

    /// Whether the perspective is up or on its way up or down.
    pub fn is_active(self) -> bool {
        self != Self::Stopped
    }

    /// The rest state matching a native "is running" answer.
    pub fn from_running(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl TryFrom<u8> for PerspectiveState {
    type Error = InvalidStateCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::Starting),
            2 => Ok(Self::Running),
            3 => Ok(Self::Stopping),
            other => Err(InvalidStateCode(other)),
        }
    }
}

impl std::fmt::Display for PerspectiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Starting => write!(f, "STARTING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_legacy_values() {
        for state in [
            PerspectiveState::Stopped,
            PerspectiveState::Starting,
            PerspectiveState::Running,
            PerspectiveState::Stopping,
        ] {
            assert_eq!(PerspectiveState::try_from(state.code()), Ok(state));
        }
        assert_eq!(PerspectiveState::Running.code(), 2);
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(PerspectiveState::try_from(7), Err(InvalidStateCode(7)));
    }

    #[test]
    fn stable_and_active() {
        assert!(PerspectiveState::Stopped.is_stable());
        assert!(PerspectiveState::Running.is_stable());
        assert!(!PerspectiveState::Starting.is_stable());
        assert!(!PerspectiveState::Stopped.is_active());
        assert!(PerspectiveState::Stopping.is_active());
    }

    #[test]
    fn display_names() {
        assert_eq!(PerspectiveState::Starting.to_string(), "STARTING");
        assert_eq!(PerspectiveState::Stopped.to_string(), "STOPPED");
    }

    #[test]
    fn serde_uses_variant_names() {
        let json = serde_json::to_string(&PerspectiveState::Running).unwrap();
        assert_eq!(json, "\"Running\"");
    }
}
