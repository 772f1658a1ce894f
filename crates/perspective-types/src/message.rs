//! Service protocol message types.
//!
//! Clients send [`Request`]s over the service socket; the service answers
//! each with a [`ServerMessage::Response`] and, once a client has registered
//! a callback, interleaves [`ServerMessage::Event`]s for every state change.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::state::PerspectiveState;

/// Current protocol version.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

/// Protocol version for compatibility negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Client-to-service calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Request {
    /// First frame on every connection.
    Hello { version: ProtocolVersion },

    /// Ask for the perspective to start. Fire-and-forget.
    Start,

    /// Ask for the perspective to stop. Fire-and-forget.
    Stop,

    /// Whether the perspective is running right now.
    IsRunning,

    /// Receive lifecycle events on this connection until it closes.
    RegisterCallback,
}

/// Answer to a single [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Response {
    /// Reply to `Hello`.
    Welcome { version: ProtocolVersion },

    /// The request was queued.
    Ack,

    /// Reply to `IsRunning`.
    Running(bool),

    /// The connection now receives events.
    Registered,

    /// The request was rejected.
    Error(String),
}

/// Service-to-client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ServerMessage {
    Response(Response),
    Event(PerspectiveState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_carries_state() {
        let config = bincode::config::standard();
        let msg = ServerMessage::Event(PerspectiveState::Stopping);
        let bytes = bincode::encode_to_vec(&msg, config).unwrap();
        let (decoded, _): (ServerMessage, _) = bincode::decode_from_slice(&bytes, config).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn protocol_version_display() {
        assert_eq!(PROTOCOL_VERSION.to_string(), "1.0");
    }
}
