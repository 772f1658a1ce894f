//! Polling triggers that turn platform changes into controller commands.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use perspective_platform::{DisplayProvider, InputDevices};
use perspective_types::{DisplayId, InputDeviceId, InputDeviceInfo};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::Controller;
use crate::error::ControllerError;

/// Watches the display provider and reports attach/detach.
///
/// Every display is reported; the controller decides which ones are
/// presentation displays.
pub struct DisplayWatcher {
    provider: Arc<dyn DisplayProvider>,
    interval: Duration,
    known: BTreeSet<DisplayId>,
}

impl DisplayWatcher {
    pub fn new(provider: Arc<dyn DisplayProvider>, interval: Duration) -> Self {
        Self {
            provider,
            interval,
            known: BTreeSet::new(),
        }
    }

    /// Compare against the previous poll and forward the differences.
    pub fn poll(&mut self, controller: &Controller) -> Result<(), ControllerError> {
        let current: BTreeSet<DisplayId> =
            self.provider.displays().into_iter().map(|d| d.id).collect();

        for id in current.difference(&self.known) {
            debug!(display = %id, "display appeared");
            controller.display_added(*id)?;
        }
        for id in self.known.difference(&current) {
            debug!(display = %id, "display disappeared");
            controller.display_removed(*id)?;
        }
        self.known = current;
        Ok(())
    }

    pub async fn run(mut self, controller: Controller, cancel: CancellationToken) {
        info!(interval = ?self.interval, "display watcher started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll(&controller) {
                        debug!(error = %e, "controller gone, display watcher exiting");
                        break;
                    }
                }
            }
        }
    }
}

/// Watches the attached input devices and reports any change.
///
/// The first poll only records what is attached.
pub struct InputWatcher {
    input: Arc<dyn InputDevices>,
    interval: Duration,
    known: Option<BTreeMap<InputDeviceId, InputDeviceInfo>>,
}

impl InputWatcher {
    pub fn new(input: Arc<dyn InputDevices>, interval: Duration) -> Self {
        Self {
            input,
            interval,
            known: None,
        }
    }

    /// Returns whether a change was reported.
    pub fn poll(&mut self, controller: &Controller) -> Result<bool, ControllerError> {
        let current: BTreeMap<InputDeviceId, InputDeviceInfo> = self
            .input
            .devices()
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let changed = self.known.as_ref().is_some_and(|known| *known != current);
        self.known = Some(current);
        if changed {
            debug!("input devices changed");
            controller.input_devices_changed()?;
        }
        Ok(changed)
    }

    pub async fn run(mut self, controller: Controller, cancel: CancellationToken) {
        info!(interval = ?self.interval, "input watcher started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll(&controller) {
                        debug!(error = %e, "controller gone, input watcher exiting");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use perspective_platform::mock::{
        MockDisplays, MockExecutor, MockInputDevices, MockPresenter, MockSettings,
    };

    use super::*;
    use crate::controller::{ControllerOptions, Platform};

    async fn controller(displays: &MockDisplays, input: &MockInputDevices) -> Controller {
        let platform = Platform {
            executor: Box::new(MockExecutor::new()),
            displays: Arc::new(displays.clone()),
            input: Arc::new(input.clone()),
            notifications: Arc::new(MockPresenter::new()),
            settings: Arc::new(MockSettings::new()),
        };
        let options = ControllerOptions {
            auto_start: false,
            ..ControllerOptions::default()
        };
        Controller::spawn(options, platform).await.unwrap().0
    }

    async fn settle(controller: &Controller, presentation_displays: usize) {
        let mut status = controller.status_receiver();
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| s.presentation_displays == presentation_displays),
        )
        .await
        .expect("timed out waiting for display count")
        .unwrap();
    }

    #[tokio::test]
    async fn display_watcher_reports_attach_and_detach() {
        let displays = MockDisplays::new();
        let input = MockInputDevices::new();
        let controller = controller(&displays, &input).await;
        let mut watcher = DisplayWatcher::new(Arc::new(displays.clone()), Duration::from_secs(1));

        let hdmi = displays.attach(1, "HDMI-A-1", true);
        displays.attach(2, "eDP-1", false);
        watcher.poll(&controller).unwrap();
        settle(&controller, 1).await;

        displays.detach(hdmi);
        watcher.poll(&controller).unwrap();
        settle(&controller, 0).await;
    }

    #[tokio::test]
    async fn input_watcher_ignores_first_poll() {
        let displays = MockDisplays::new();
        let input = MockInputDevices::new();
        let controller = controller(&displays, &input).await;
        let mut watcher = InputWatcher::new(Arc::new(input.clone()), Duration::from_secs(1));

        input.attach(1, "Touchscreen", false);
        assert!(!watcher.poll(&controller).unwrap());
        assert!(!watcher.poll(&controller).unwrap());

        let keyboard = input.attach(2, "USB Keyboard", true);
        assert!(watcher.poll(&controller).unwrap());
        assert!(!watcher.poll(&controller).unwrap());

        input.detach(keyboard);
        assert!(watcher.poll(&controller).unwrap());
    }

    #[tokio::test]
    async fn watchers_stop_on_cancel() {
        let displays = MockDisplays::new();
        let input = MockInputDevices::new();
        let controller = controller(&displays, &input).await;
        let cancel = CancellationToken::new();

        let display_task = tokio::spawn(
            DisplayWatcher::new(Arc::new(displays), Duration::from_millis(10))
                .run(controller.clone(), cancel.clone()),
        );
        let input_task = tokio::spawn(
            InputWatcher::new(Arc::new(input), Duration::from_millis(10))
                .run(controller, cancel.clone()),
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), async {
            display_task.await.unwrap();
            input_task.await.unwrap();
        })
        .await
        .expect("watchers did not stop");
    }
}
