//! Unix socket transport and wire protocol for perspective.
//!
//! This crate handles the service socket (bind, accept, connect), message
//! serialisation/deserialisation (via bincode v2), the version handshake,
//! and [`PerspectiveClient`], the library clients use to talk to the service.

pub mod client;
pub mod connection;
pub mod error;
pub mod transport;
pub mod wire;

pub use client::{EventStream, PerspectiveClient};
pub use connection::{MessageReceiver, MessageSender};
pub use error::ProtocolError;
pub use transport::{PendingConnection, ServiceConnection, ServiceListener};
