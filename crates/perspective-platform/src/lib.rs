//! Platform collaborators for perspective.
//!
//! This crate defines the traits the perspective controller drives: the
//! [`NativeExecutor`] that actually switches the perspective on and off, the
//! [`DisplayProvider`] and [`InputDevices`] it consults, and the
//! [`NotificationPresenter`] and [`SettingsStore`] it updates as side
//! effects. Concrete backends live in the submodules; the `mock` feature adds
//! observable in-memory backends for tests.

use std::sync::Arc;

use async_trait::async_trait;
use perspective_types::{
    DisplayId, DisplayInfo, InputDeviceId, InputDeviceInfo, Notification, NotificationId,
};

pub mod command;
pub mod error;
pub mod input;
pub mod notification;
pub mod settings;
pub mod sysfs;

#[cfg(all(target_os = "linux", feature = "linux"))]
pub mod linux;

#[cfg(feature = "mock")]
pub mod mock;

pub use command::{CommandExecutor, NativeCommands};
pub use error::PlatformError;
pub use input::NoInputDevices;
pub use notification::LogPresenter;
pub use settings::FileSettings;
pub use sysfs::SysfsDisplays;

/// Factory for the native client handle.
///
/// Called exactly once, when the controller becomes ready. The returned
/// client is kept for the controller's lifetime.
#[async_trait]
pub trait NativeExecutor: Send + Sync + 'static {
    async fn create_client(&self) -> Result<Arc<dyn NativeClient>, PlatformError>;
}

/// Handle to the component that performs the hardware-level switch.
///
/// Every call may fail. A client whose remote side has gone away fails
/// every call rather than panicking.
#[async_trait]
pub trait NativeClient: Send + Sync + 'static {
    /// Bring the perspective up. Blocks until it is up or has failed.
    async fn start(&self) -> Result<(), PlatformError>;

    /// Take the perspective down. Blocks until it is down or has failed.
    async fn stop(&self) -> Result<(), PlatformError>;

    /// Ground truth: is the perspective up right now?
    async fn is_running(&self) -> Result<bool, PlatformError>;

    /// Route (or stop routing) input events to the perspective.
    async fn set_input_enabled(&self, enabled: bool) -> Result<(), PlatformError>;
}

/// Read access to attached displays.
pub trait DisplayProvider: Send + Sync + 'static {
    /// Look up a display by ID. `None` if it is not (or no longer) attached.
    fn display(&self, id: DisplayId) -> Option<DisplayInfo>;

    /// All currently attached displays.
    fn displays(&self) -> Vec<DisplayInfo>;
}

/// Enumeration and enable/disable of attached input devices.
pub trait InputDevices: Send + Sync + 'static {
    /// All currently attached input devices.
    fn devices(&self) -> Vec<InputDeviceInfo>;

    /// Enable or disable a single device.
    fn set_enabled(&self, id: InputDeviceId, enabled: bool) -> Result<(), PlatformError>;
}

/// Shows and cancels persistent user-visible notifications.
pub trait NotificationPresenter: Send + Sync + 'static {
    /// Show the notification, or update it in place if already shown.
    fn notify(&self, id: NotificationId, notification: &Notification)
        -> Result<(), PlatformError>;

    /// Remove the notification if shown.
    fn cancel(&self, id: NotificationId) -> Result<(), PlatformError>;
}

/// Process-wide properties and persisted user settings.
pub trait SettingsStore: Send + Sync + 'static {
    /// Set a transient system property.
    fn set_property(&self, key: &str, value: &str) -> Result<(), PlatformError>;

    /// Persist an integer user setting.
    fn put_int(&self, key: &str, value: i32) -> Result<(), PlatformError>;
}
