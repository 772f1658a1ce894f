//! Linux backends.

pub mod input;

pub use input::EvdevInputDevices;
