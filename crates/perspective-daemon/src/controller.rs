//! The perspective controller.
//!
//! A [`Controller`] is a cheap, clonable handle. All state-changing work
//! runs on a single worker task that drains the command queue in order and
//! is the only writer of [`ControllerState`]. Reads go straight to the lock.
//!
//! Native calls are made outside the lock. While one is in flight the
//! tracked state is transient (`STARTING`/`STOPPING`), so nothing else
//! can act on a half-finished transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use perspective_platform::{
    DisplayProvider, InputDevices, NativeExecutor, NotificationPresenter, SettingsStore,
};
use perspective_types::{ClientId, DisplayId, PerspectiveState};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use crate::interactive::InteractiveInput;
use crate::native::NativeHandle;
use crate::notification::DesktopNotification;
use crate::registry::EventSink;
use crate::state::{ControllerState, ControllerStatus};

/// Default bound on a single native call.
pub const DEFAULT_NATIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Work items for the controller's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Force the tracked state to match the native side.
    Reconcile,
    DisplayAdded(DisplayId),
    DisplayRemoved(DisplayId),
    /// Input devices were attached, detached, or changed.
    InputDevicesChanged,
    /// Recompute the interactive flag and apply it if it changed.
    RefreshInteractive,
    /// A registered client went away.
    ClientDied { client: ClientId, serial: u64 },
    Shutdown,
}

/// Controller behaviour knobs.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Start the perspective when the first presentation display attaches.
    pub auto_start: bool,
    pub native_timeout: Duration,
    /// Deep-link target for the notification.
    pub dashboard: Option<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            native_timeout: DEFAULT_NATIVE_TIMEOUT,
            dashboard: None,
        }
    }
}

/// The collaborators the controller drives.
pub struct Platform {
    pub executor: Box<dyn NativeExecutor>,
    pub displays: Arc<dyn DisplayProvider>,
    pub input: Arc<dyn InputDevices>,
    pub notifications: Arc<dyn NotificationPresenter>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Everything guarded by the controller lock.
struct Locked {
    state: ControllerState,
    notification: DesktopNotification,
}

impl Locked {
    /// Enter `to`, running the side effects of a state change. Returns the
    /// new interactive value if it changed.
    fn enter(&mut self, to: PerspectiveState) -> Option<bool> {
        let from = self.state.perspective;
        if from == to {
            return None;
        }
        self.state.perspective = to;
        debug!(%from, %to, "perspective state changed");

        self.notification.update(to);
        self.state.registry.dispatch(to);
        self.state.refresh_interactive()
    }
}

struct Shared {
    locked: Mutex<Locked>,
    status: watch::Sender<ControllerStatus>,
}

impl Shared {
    /// Run `f` as one locked transaction and publish the resulting status.
    fn transact<R>(&self, f: impl FnOnce(&mut Locked) -> R) -> R {
        let mut locked = self.locked.lock();
        let result = f(&mut locked);
        self.status.send_replace(locked.state.status());
        result
    }

    fn read<R>(&self, f: impl FnOnce(&Locked) -> R) -> R {
        f(&self.locked.lock())
    }
}

/// Handle to a running controller.
#[derive(Clone)]
pub struct Controller {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    native: NativeHandle,
    interactive: Arc<AtomicBool>,
    /// Set while a drift check is waiting on the native side.
    drift_check: Arc<AtomicBool>,
    runtime: Handle,
}

impl Controller {
    /// Create the native client and spawn the worker.
    ///
    /// The native client is created exactly once and lives as long as the
    /// controller.
    pub async fn spawn(
        options: ControllerOptions,
        platform: Platform,
    ) -> Result<(Self, JoinHandle<()>), ControllerError> {
        let client = platform.executor.create_client().await?;
        let native = NativeHandle::new(client, options.native_timeout);
        let flag = Arc::new(AtomicBool::new(false));

        let state = ControllerState::default();
        let (status, _) = watch::channel(state.status());
        let shared = Arc::new(Shared {
            locked: Mutex::new(Locked {
                state,
                notification: DesktopNotification::new(
                    platform.notifications,
                    options.dashboard,
                ),
            }),
            status,
        });

        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            shared: Arc::clone(&shared),
            native: native.clone(),
            interactive: InteractiveInput::new(
                platform.input,
                platform.settings,
                Arc::clone(&flag),
            ),
            displays: platform.displays,
            auto_start: options.auto_start,
            requeue: commands.downgrade(),
            commands: rx,
        };
        let task = tokio::spawn(worker.run());

        info!(
            auto_start = options.auto_start,
            native_timeout = ?options.native_timeout,
            "perspective controller started"
        );

        Ok((
            Self {
                commands,
                shared,
                native,
                interactive: flag,
                drift_check: Arc::new(AtomicBool::new(false)),
                runtime: Handle::current(),
            },
            task,
        ))
    }

    /// Ask for the perspective to start. Ignored unless it is stopped when
    /// the request is processed, so a start asked for during a stop runs
    /// once the stop has finished.
    pub fn request_start(&self) -> Result<(), ControllerError> {
        self.enqueue(Command::Start)
    }

    /// Ask for the perspective to stop. Ignored unless it is running when
    /// the request is processed, and dropped outright while a start is in
    /// flight.
    pub fn request_stop(&self) -> Result<(), ControllerError> {
        if self.state() == PerspectiveState::Starting {
            debug!("stop requested while starting, ignored");
            return Ok(());
        }
        self.enqueue(Command::Stop)
    }

    /// Whether the tracked state is `RUNNING`.
    ///
    /// Also checks the native side in the background; if it disagrees
    /// with a stable tracked state, a reconcile is queued. At most one such
    /// check is outstanding; queries made meanwhile do not start another.
    /// The answer returned here is never affected by that check.
    pub fn is_running(&self) -> bool {
        let tracked = self.state();

        if self
            .drift_check
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let controller = self.clone();
            self.runtime.spawn(async move {
                controller.check_drift().await;
            });
        }

        tracked == PerspectiveState::Running
    }

    async fn check_drift(&self) {
        let answer = self.native.is_running().await;
        self.drift_check.store(false, Ordering::Release);
        let actual = match answer {
            Ok(actual) => actual,
            Err(e) => {
                debug!(error = %e, "native state query failed");
                return;
            }
        };

        let tracked = self.state();
        if tracked.is_stable() && PerspectiveState::from_running(actual) != tracked {
            warn!(%tracked, native_running = actual, "perspective state drifted, reconciling");
            if let Err(e) = self.enqueue(Command::Reconcile) {
                debug!(error = %e, "could not queue reconcile");
            }
        }
    }

    /// Register `sink` for state events on behalf of `client`.
    ///
    /// A second registration for the same client replaces the first. The
    /// registration is dropped automatically once the receiving side of
    /// `sink` goes away.
    pub fn register_callback(
        &self,
        client: ClientId,
        sink: Option<EventSink>,
    ) -> Result<(), ControllerError> {
        let sink = sink.ok_or_else(|| {
            ControllerError::InvalidArgument("callback cannot be null".to_string())
        })?;
        if self.commands.is_closed() {
            return Err(ControllerError::NotRunning);
        }

        let monitor = sink.clone();
        let registered = self
            .shared
            .transact(|locked| locked.state.registry.insert(client, sink));
        if registered.replaced {
            warn!(%client, "callback already registered, replacing");
        } else {
            info!(%client, "callback registered");
        }

        let commands = self.commands.downgrade();
        let serial = registered.serial;
        let liveness = registered.liveness;
        self.runtime.spawn(async move {
            tokio::select! {
                () = liveness.cancelled() => {}
                () = monitor.closed() => {
                    if let Some(commands) = commands.upgrade() {
                        let _ = commands.send(Command::ClientDied { client, serial });
                    }
                }
            }
        });
        Ok(())
    }

    pub fn display_added(&self, id: DisplayId) -> Result<(), ControllerError> {
        self.enqueue(Command::DisplayAdded(id))
    }

    pub fn display_removed(&self, id: DisplayId) -> Result<(), ControllerError> {
        self.enqueue(Command::DisplayRemoved(id))
    }

    pub fn input_devices_changed(&self) -> Result<(), ControllerError> {
        self.enqueue(Command::InputDevicesChanged)
    }

    /// Ask the worker to clean up and exit.
    pub fn shutdown(&self) -> Result<(), ControllerError> {
        self.enqueue(Command::Shutdown)
    }

    /// Current tracked state.
    pub fn state(&self) -> PerspectiveState {
        self.shared.read(|locked| locked.state.perspective)
    }

    pub fn status(&self) -> ControllerStatus {
        self.shared.read(|locked| locked.state.status())
    }

    /// Status snapshots, published after every locked transaction.
    pub fn status_receiver(&self) -> watch::Receiver<ControllerStatus> {
        self.shared.status.subscribe()
    }

    /// The process-wide interactive flag, as last applied.
    pub fn interactive_flag(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    fn enqueue(&self, command: Command) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .map_err(|_| ControllerError::NotRunning)
    }
}

struct Worker {
    shared: Arc<Shared>,
    native: NativeHandle,
    interactive: InteractiveInput,
    displays: Arc<dyn DisplayProvider>,
    auto_start: bool,
    requeue: mpsc::WeakUnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Worker {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            debug!(?command, "processing command");
            match command {
                Command::Start => self.start().await,
                Command::Stop => self.stop().await,
                Command::Reconcile => self.reconcile().await,
                Command::DisplayAdded(id) => self.display_added(id).await,
                Command::DisplayRemoved(id) => self.display_removed(id).await,
                Command::InputDevicesChanged => self.input_devices_changed().await,
                Command::RefreshInteractive => self.refresh_interactive().await,
                Command::ClientDied { client, serial } => self.client_died(client, serial),
                Command::Shutdown => break,
            }
        }

        self.shared.transact(|locked| {
            locked.notification.hide();
            locked.state.registry.clear();
        });
        info!("perspective controller stopped");
    }

    async fn start(&self) {
        let Some(interactive) = self.shared.transact(|locked| {
            locked
                .state
                .can_start()
                .then(|| locked.enter(PerspectiveState::Starting))
        }) else {
            debug!(state = %self.state(), "start ignored");
            return;
        };
        self.apply_interactive(interactive).await;

        let next = match self.native.start().await {
            Ok(()) => {
                info!("perspective started");
                PerspectiveState::Running
            }
            Err(e) => {
                error!(error = %e, "failed to start perspective");
                PerspectiveState::Stopped
            }
        };
        let interactive = self.shared.transact(|locked| locked.enter(next));
        self.apply_interactive(interactive).await;
    }

    async fn stop(&self) {
        let Some(interactive) = self.shared.transact(|locked| {
            locked
                .state
                .can_stop()
                .then(|| locked.enter(PerspectiveState::Stopping))
        }) else {
            debug!(state = %self.state(), "stop ignored");
            return;
        };
        self.apply_interactive(interactive).await;

        let next = match self.native.stop().await {
            Ok(()) => {
                info!("perspective stopped");
                PerspectiveState::Stopped
            }
            Err(e) => {
                error!(error = %e, "failed to stop perspective");
                PerspectiveState::Running
            }
        };
        let interactive = self.shared.transact(|locked| locked.enter(next));
        self.apply_interactive(interactive).await;
    }

    async fn reconcile(&self) {
        let actual = match self.native.is_running().await {
            Ok(actual) => actual,
            Err(e) => {
                warn!(error = %e, "native state query failed, skipping reconcile");
                return;
            }
        };

        let interactive = self.shared.transact(|locked| {
            let tracked = locked.state.perspective;
            let target = PerspectiveState::from_running(actual);
            // Transient states belong to the in-flight start or stop.
            if !tracked.is_stable() || tracked == target {
                return None;
            }
            warn!(%tracked, %target, "reconciling perspective state");
            locked.enter(target)
        });
        self.apply_interactive(interactive).await;
    }

    async fn display_added(&self, id: DisplayId) {
        let Some(info) = self.displays.display(id) else {
            debug!(display = %id, "display gone before it could be inspected");
            return;
        };
        if !info.presentation {
            debug!(display = %id, name = %info.name, "ignoring non-presentation display");
            return;
        }

        let (first, interactive) = self.shared.transact(|locked| {
            let first = !locked.state.presentation_connected();
            locked.state.presentation_displays.insert(id);
            (first, locked.state.refresh_interactive())
        });
        info!(display = %id, name = %info.name, "presentation display attached");

        if first && self.auto_start {
            self.requeue(Command::Start);
            self.requeue(Command::RefreshInteractive);
        }
        self.apply_interactive(interactive).await;
    }

    async fn display_removed(&self, id: DisplayId) {
        let removed = self.shared.transact(|locked| {
            locked
                .state
                .presentation_displays
                .remove(&id)
                .then(|| locked.state.refresh_interactive())
        });
        let Some(interactive) = removed else {
            debug!(display = %id, "ignoring removal of untracked display");
            return;
        };
        info!(display = %id, "presentation display detached");
        self.apply_interactive(interactive).await;
    }

    /// Reconcile, then push the current interactive value to whatever is
    /// attached now.
    async fn input_devices_changed(&self) {
        self.reconcile().await;
        let enabled = self
            .shared
            .read(|locked| locked.state.interactive_input_enabled);
        self.interactive.apply(enabled, &self.native).await;
    }

    async fn refresh_interactive(&self) {
        let interactive = self
            .shared
            .transact(|locked| locked.state.refresh_interactive());
        self.apply_interactive(interactive).await;
    }

    fn client_died(&self, client: ClientId, serial: u64) {
        let removed = self
            .shared
            .transact(|locked| locked.state.registry.remove_if_current(client, serial));
        if removed {
            info!(%client, "client gone, callback removed");
        }
    }

    async fn apply_interactive(&self, change: Option<bool>) {
        if let Some(enabled) = change {
            self.interactive.apply(enabled, &self.native).await;
        }
    }

    fn requeue(&self, command: Command) {
        if let Some(commands) = self.requeue.upgrade() {
            let _ = commands.send(command);
        }
    }

    fn state(&self) -> PerspectiveState {
        self.shared.read(|locked| locked.state.perspective)
    }
}

#[cfg(test)]
mod tests {
    use perspective_platform::mock::{MockPresenter, NotificationRecord};

    use super::*;
    use crate::notification::NOTIFICATION_ID;

    fn locked(presenter: &MockPresenter) -> Locked {
        Locked {
            state: ControllerState::default(),
            notification: DesktopNotification::new(Arc::new(presenter.clone()), None),
        }
    }

    #[test]
    fn entering_a_state_notifies_and_dispatches() {
        let presenter = MockPresenter::new();
        let mut locked = locked(&presenter);
        let (sink, mut rx) = EventSink::channel();
        locked.state.registry.insert(ClientId(1), sink);

        assert_eq!(locked.enter(PerspectiveState::Starting), None);
        assert_eq!(rx.try_recv().unwrap(), PerspectiveState::Starting);
        assert!(presenter.shown(NOTIFICATION_ID).is_some());

        locked.enter(PerspectiveState::Running);
        locked.enter(PerspectiveState::Stopping);
        locked.enter(PerspectiveState::Stopped);
        assert!(presenter.shown(NOTIFICATION_ID).is_none());
        assert!(matches!(
            presenter.history().last(),
            Some(NotificationRecord::Cancelled(_))
        ));
    }

    #[test]
    fn entering_the_current_state_does_nothing() {
        let presenter = MockPresenter::new();
        let mut locked = locked(&presenter);
        let (sink, mut rx) = EventSink::channel();
        locked.state.registry.insert(ClientId(1), sink);

        assert_eq!(locked.enter(PerspectiveState::Stopped), None);
        assert!(rx.try_recv().is_err());
        assert!(presenter.history().is_empty());
    }

    #[test]
    fn entering_running_with_a_display_turns_interactive_on() {
        let presenter = MockPresenter::new();
        let mut locked = locked(&presenter);
        locked.state.presentation_displays.insert(DisplayId(1));

        assert_eq!(locked.enter(PerspectiveState::Starting), None);
        assert_eq!(locked.enter(PerspectiveState::Running), Some(true));
        assert_eq!(locked.enter(PerspectiveState::Stopping), Some(false));
    }
}
