//! Applying the derived interactive-input state.
//!
//! While the perspective is running on a presentation display it is
//! "interactive": external keyboards and mice belong to it. Applying a new
//! value, in order:
//!
//! 1. publish it through the process-wide flag and property,
//! 2. disable (interactive) or re-enable external input devices,
//! 3. ask the native side to route input to the perspective, or stop,
//! 4. on success, persist the matching IME preference.
//!
//! A routing failure is logged and step 2 is left as is; the next
//! application fixes things up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use perspective_platform::{InputDevices, SettingsStore};
use tracing::{debug, info, warn};

use crate::native::NativeHandle;

/// Property exposing the current interactive flag to other processes.
pub const INTERACTIVE_PROPERTY: &str = "perspective.desktop.interactive";

/// Persisted preference: show the on-screen keyboard even with a hardware
/// keyboard attached.
pub const SHOW_IME_WITH_HARD_KEYBOARD: &str = "show_ime_with_hard_keyboard";

pub struct InteractiveInput {
    input: Arc<dyn InputDevices>,
    settings: Arc<dyn SettingsStore>,
    flag: Arc<AtomicBool>,
}

impl InteractiveInput {
    pub fn new(
        input: Arc<dyn InputDevices>,
        settings: Arc<dyn SettingsStore>,
        flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            input,
            settings,
            flag,
        }
    }

    /// Apply `enabled` to the flag, the external devices, the native
    /// routing, and the persisted preference.
    pub async fn apply(&self, enabled: bool, native: &NativeHandle) {
        info!(enabled, "applying interactive input state");

        self.flag.store(enabled, Ordering::SeqCst);
        if let Err(e) = self
            .settings
            .set_property(INTERACTIVE_PROPERTY, if enabled { "true" } else { "false" })
        {
            warn!(error = %e, "failed to set interactive property");
        }

        self.apply_to_devices(enabled);

        match native.set_input_enabled(enabled).await {
            Ok(()) => {
                if let Err(e) = self
                    .settings
                    .put_int(SHOW_IME_WITH_HARD_KEYBOARD, i32::from(enabled))
                {
                    warn!(error = %e, "failed to persist {SHOW_IME_WITH_HARD_KEYBOARD}");
                }
            }
            Err(e) => warn!(error = %e, enabled, "update interactive input state failed"),
        }
    }

    /// External devices are disabled while interactive. Built-in devices
    /// are never touched.
    fn apply_to_devices(&self, interactive: bool) {
        for device in self.input.devices().into_iter().filter(|d| d.external) {
            match self.input.set_enabled(device.id, !interactive) {
                Ok(()) => debug!(device = %device.id, name = %device.name, enabled = !interactive, "input device updated"),
                Err(e) => warn!(device = %device.id, error = %e, "failed to update input device"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use perspective_platform::mock::{MockExecutor, MockInputDevices, MockSettings};
    use perspective_platform::NativeExecutor;

    use super::*;

    async fn fixture() -> (
        InteractiveInput,
        NativeHandle,
        MockInputDevices,
        MockSettings,
        perspective_platform::mock::MockNativeHandle,
        Arc<AtomicBool>,
    ) {
        let input = MockInputDevices::new();
        let settings = MockSettings::new();
        let executor = MockExecutor::new();
        let native_handle = executor.handle();
        let native = NativeHandle::new(
            executor.create_client().await.unwrap(),
            Duration::from_secs(1),
        );
        let flag = Arc::new(AtomicBool::new(false));
        let interactive = InteractiveInput::new(
            Arc::new(input.clone()),
            Arc::new(settings.clone()),
            Arc::clone(&flag),
        );
        (interactive, native, input, settings, native_handle, flag)
    }

    #[tokio::test]
    async fn enabling_disables_only_external_devices() {
        let (interactive, native, input, settings, native_handle, flag) = fixture().await;
        let keyboard = input.attach(1, "USB Keyboard", true);
        let touchscreen = input.attach(2, "Touchscreen", false);

        interactive.apply(true, &native).await;

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(settings.property(INTERACTIVE_PROPERTY).as_deref(), Some("true"));
        assert_eq!(input.is_enabled(keyboard), Some(false));
        assert_eq!(input.is_enabled(touchscreen), Some(true));
        assert!(input.calls().iter().all(|(id, _)| *id == keyboard));
        assert_eq!(native_handle.input_calls(), vec![true]);
        assert_eq!(settings.int(SHOW_IME_WITH_HARD_KEYBOARD), Some(1));

        interactive.apply(false, &native).await;
        assert_eq!(input.is_enabled(keyboard), Some(true));
        assert_eq!(settings.int(SHOW_IME_WITH_HARD_KEYBOARD), Some(0));
    }

    #[tokio::test]
    async fn routing_failure_keeps_devices_and_skips_preference() {
        let (interactive, native, input, settings, native_handle, flag) = fixture().await;
        let keyboard = input.attach(1, "USB Keyboard", true);
        native_handle.set_fail_input(true);

        interactive.apply(true, &native).await;

        assert!(flag.load(Ordering::SeqCst));
        // Not rolled back.
        assert_eq!(input.is_enabled(keyboard), Some(false));
        assert_eq!(settings.int(SHOW_IME_WITH_HARD_KEYBOARD), None);
    }

    #[tokio::test]
    async fn preference_write_failure_is_tolerated() {
        let (interactive, native, _input, settings, native_handle, _flag) = fixture().await;
        settings.set_fail_writes(true);

        interactive.apply(true, &native).await;

        assert!(native_handle.input_enabled());
        assert_eq!(settings.int(SHOW_IME_WITH_HARD_KEYBOARD), None);
    }
}
