//! Shared types for perspective.
//!
//! This crate contains all types shared across the perspective workspace:
//! the perspective lifecycle state, client identity, display and input
//! device descriptors, notification content, and service protocol messages.

pub mod client;
pub mod device;
pub mod display;
pub mod message;
pub mod notification;
pub mod state;

pub use client::ClientId;
pub use device::{InputDeviceId, InputDeviceInfo};
pub use display::{DisplayId, DisplayInfo};
pub use message::{ProtocolVersion, Request, Response, ServerMessage, PROTOCOL_VERSION};
pub use notification::{Notification, NotificationId};
pub use state::{InvalidStateCode, PerspectiveState};
