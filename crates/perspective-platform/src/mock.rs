//! Mock platform backends for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use perspective_types::{
    DisplayId, DisplayInfo, InputDeviceId, InputDeviceInfo, Notification, NotificationId,
};
use tokio::sync::Notify;

use crate::error::PlatformError;
use crate::{
    DisplayProvider, InputDevices, NativeClient, NativeExecutor, NotificationPresenter,
    SettingsStore,
};

// ---------------------------------------------------------------------------
// MockExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockNativeState {
    running: bool,
    input_enabled: bool,
    clients_created: u32,
    start_calls: u32,
    stop_calls: u32,
    status_calls: u32,
    input_calls: Vec<bool>,
    fail_start: bool,
    fail_stop: bool,
    fail_input: bool,
    dead: bool,
    delay: Option<Duration>,
    status_delay: Option<Duration>,
}

/// Mock native executor.
///
/// Tracks a "ground truth" running flag that start/stop flip on success.
/// Failures, latency, and a gate that holds `start` until released are all
/// switchable from the [`MockNativeHandle`].
pub struct MockExecutor {
    state: Arc<Mutex<MockNativeState>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockNativeState::default())),
            gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a clonable handle for steering and observing the native side.
    pub fn handle(&self) -> MockNativeHandle {
        MockNativeHandle {
            state: Arc::clone(&self.state),
            gate: Arc::clone(&self.gate),
        }
    }
}

#[async_trait]
impl NativeExecutor for MockExecutor {
    async fn create_client(&self) -> Result<Arc<dyn NativeClient>, PlatformError> {
        self.state.lock().unwrap().clients_created += 1;
        Ok(Arc::new(MockNativeClient {
            state: Arc::clone(&self.state),
            gate: Arc::clone(&self.gate),
        }))
    }
}

struct MockNativeClient {
    state: Arc<Mutex<MockNativeState>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockNativeClient {
    async fn latency(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_alive(&self) -> Result<(), PlatformError> {
        if self.state.lock().unwrap().dead {
            Err(PlatformError::Native("remote died".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NativeClient for MockNativeClient {
    async fn start(&self) -> Result<(), PlatformError> {
        self.state.lock().unwrap().start_calls += 1;
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.latency().await;
        self.check_alive()?;

        let mut state = self.state.lock().unwrap();
        if state.fail_start {
            return Err(PlatformError::Native("start failed".to_string()));
        }
        state.running = true;
        Ok(())
    }

    async fn stop(&self) -> Result<(), PlatformError> {
        self.state.lock().unwrap().stop_calls += 1;
        self.latency().await;
        self.check_alive()?;

        let mut state = self.state.lock().unwrap();
        if state.fail_stop {
            return Err(PlatformError::Native("stop failed".to_string()));
        }
        state.running = false;
        Ok(())
    }

    async fn is_running(&self) -> Result<bool, PlatformError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.status_calls += 1;
            state.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_alive()?;
        Ok(self.state.lock().unwrap().running)
    }

    async fn set_input_enabled(&self, enabled: bool) -> Result<(), PlatformError> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        state.input_calls.push(enabled);
        if state.fail_input {
            return Err(PlatformError::Native("input routing failed".to_string()));
        }
        state.input_enabled = enabled;
        Ok(())
    }
}

/// Clonable handle for `MockExecutor`.
#[derive(Clone)]
pub struct MockNativeHandle {
    state: Arc<Mutex<MockNativeState>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockNativeHandle {
    /// Force the ground truth, as if the perspective changed underneath us.
    pub fn set_running(&self, running: bool) {
        self.state.lock().unwrap().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.state.lock().unwrap().fail_stop = fail;
    }

    pub fn set_fail_input(&self, fail: bool) {
        self.state.lock().unwrap().fail_input = fail;
    }

    /// Make every subsequent call fail, as if the native side went away.
    pub fn kill(&self) {
        self.state.lock().unwrap().dead = true;
    }

    /// Add latency to start and stop.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Add latency to status queries.
    pub fn set_status_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().status_delay = delay;
    }

    /// Hold every `start` call until [`release_start`](Self::release_start).
    pub fn hold_start(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    /// Let one held `start` call proceed and stop holding new ones.
    pub fn release_start(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    pub fn clients_created(&self) -> u32 {
        self.state.lock().unwrap().clients_created
    }

    pub fn start_calls(&self) -> u32 {
        self.state.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.state.lock().unwrap().stop_calls
    }

    pub fn status_calls(&self) -> u32 {
        self.state.lock().unwrap().status_calls
    }

    /// Every `set_input_enabled` argument, in call order.
    pub fn input_calls(&self) -> Vec<bool> {
        self.state.lock().unwrap().input_calls.clone()
    }

    /// Last successfully applied input routing.
    pub fn input_enabled(&self) -> bool {
        self.state.lock().unwrap().input_enabled
    }
}

// ---------------------------------------------------------------------------
// MockDisplays
// ---------------------------------------------------------------------------

/// Mock display provider. Clones share the same display list.
#[derive(Clone, Default)]
pub struct MockDisplays {
    displays: Arc<Mutex<BTreeMap<DisplayId, DisplayInfo>>>,
}

impl MockDisplays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a display; returns its ID for convenience.
    pub fn attach(&self, id: u32, name: &str, presentation: bool) -> DisplayId {
        let id = DisplayId(id);
        self.displays.lock().unwrap().insert(
            id,
            DisplayInfo {
                id,
                name: name.to_string(),
                presentation,
            },
        );
        id
    }

    pub fn detach(&self, id: DisplayId) {
        self.displays.lock().unwrap().remove(&id);
    }
}

impl DisplayProvider for MockDisplays {
    fn display(&self, id: DisplayId) -> Option<DisplayInfo> {
        self.displays.lock().unwrap().get(&id).cloned()
    }

    fn displays(&self) -> Vec<DisplayInfo> {
        self.displays.lock().unwrap().values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// MockInputDevices
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockInputState {
    devices: BTreeMap<InputDeviceId, InputDeviceInfo>,
    enabled: HashMap<InputDeviceId, bool>,
    calls: Vec<(InputDeviceId, bool)>,
}

/// Mock input devices. Clones share the same device table.
#[derive(Clone, Default)]
pub struct MockInputDevices {
    state: Arc<Mutex<MockInputState>>,
}

impl MockInputDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an enabled device.
    pub fn attach(&self, id: u32, name: &str, external: bool) -> InputDeviceId {
        let id = InputDeviceId(id);
        let mut state = self.state.lock().unwrap();
        state.devices.insert(
            id,
            InputDeviceInfo {
                id,
                name: name.to_string(),
                external,
            },
        );
        state.enabled.insert(id, true);
        id
    }

    pub fn detach(&self, id: InputDeviceId) {
        let mut state = self.state.lock().unwrap();
        state.devices.remove(&id);
        state.enabled.remove(&id);
    }

    /// Whether the device is currently enabled (`None` if unknown).
    pub fn is_enabled(&self, id: InputDeviceId) -> Option<bool> {
        self.state.lock().unwrap().enabled.get(&id).copied()
    }

    /// Every `set_enabled` call, in order.
    pub fn calls(&self) -> Vec<(InputDeviceId, bool)> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl InputDevices for MockInputDevices {
    fn devices(&self) -> Vec<InputDeviceInfo> {
        self.state.lock().unwrap().devices.values().cloned().collect()
    }

    fn set_enabled(&self, id: InputDeviceId, enabled: bool) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((id, enabled));
        if !state.devices.contains_key(&id) {
            return Err(PlatformError::DeviceNotFound(id));
        }
        state.enabled.insert(id, enabled);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockPresenter
// ---------------------------------------------------------------------------

/// What happened to a notification, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationRecord {
    Shown(NotificationId, Notification),
    Cancelled(NotificationId),
}

#[derive(Debug, Default)]
struct MockPresenterState {
    shown: HashMap<NotificationId, Notification>,
    history: Vec<NotificationRecord>,
}

/// Mock notification presenter. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockPresenter {
    state: Arc<Mutex<MockPresenterState>>,
}

impl MockPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The notification currently shown under `id`.
    pub fn shown(&self, id: NotificationId) -> Option<Notification> {
        self.state.lock().unwrap().shown.get(&id).cloned()
    }

    pub fn history(&self) -> Vec<NotificationRecord> {
        self.state.lock().unwrap().history.clone()
    }
}

impl NotificationPresenter for MockPresenter {
    fn notify(
        &self,
        id: NotificationId,
        notification: &Notification,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.shown.insert(id, notification.clone());
        state
            .history
            .push(NotificationRecord::Shown(id, notification.clone()));
        Ok(())
    }

    fn cancel(&self, id: NotificationId) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.shown.remove(&id);
        state.history.push(NotificationRecord::Cancelled(id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockSettingsState {
    properties: HashMap<String, String>,
    ints: HashMap<String, i32>,
    fail_writes: bool,
}

/// Mock settings store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockSettings {
    state: Arc<Mutex<MockSettingsState>>,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().properties.get(key).cloned()
    }

    pub fn int(&self, key: &str) -> Option<i32> {
        self.state.lock().unwrap().ints.get(key).copied()
    }

    /// Make `put_int` fail, as if the settings provider were unavailable.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }
}

impl SettingsStore for MockSettings {
    fn set_property(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        self.state
            .lock()
            .unwrap()
            .properties
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_int(&self, key: &str, value: i32) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(PlatformError::Settings("settings unavailable".to_string()));
        }
        state.ints.insert(key.to_string(), value);
        Ok(())
    }
}
