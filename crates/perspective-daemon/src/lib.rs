//! Core lifecycle controller for perspective.
//!
//! Implements the perspective state machine behind a single command queue,
//! the client callback registry with liveness monitoring, the derived
//! interactive-input state, display and input triggers, and the service
//! socket that clients talk to.

pub mod config;
pub mod controller;
pub mod error;
pub mod interactive;
pub mod native;
pub mod notification;
pub mod registry;
pub mod server;
pub mod setup;
pub mod state;
pub mod trigger;

pub use config::Config;
pub use controller::{Controller, ControllerOptions, Platform};
pub use error::ControllerError;
pub use registry::EventSink;
pub use server::Service;
pub use state::ControllerStatus;
