//! The persistent "desktop" notification.

use std::sync::Arc;

use perspective_platform::NotificationPresenter;
use perspective_types::{Notification, NotificationId, PerspectiveState};
use tracing::warn;

/// Fixed key for the perspective notification.
pub const NOTIFICATION_ID: NotificationId = NotificationId(0x6d44);

const NOTIFICATION_TEXT: &str = "Tap to manage the desktop.";

/// Headline for each state that shows the notification. `Stopped` shows
/// nothing.
pub fn title_for(state: PerspectiveState) -> Option<&'static str> {
    match state {
        PerspectiveState::Stopped => None,
        PerspectiveState::Starting => Some("Desktop is starting\u{2026}"),
        PerspectiveState::Running => Some("Desktop is running"),
        PerspectiveState::Stopping => Some("Desktop is stopping\u{2026}"),
    }
}

/// Keeps the notification in step with the perspective state.
pub struct DesktopNotification {
    presenter: Arc<dyn NotificationPresenter>,
    target: Option<String>,
    showing: bool,
}

impl DesktopNotification {
    pub fn new(presenter: Arc<dyn NotificationPresenter>, target: Option<String>) -> Self {
        Self {
            presenter,
            target,
            showing: false,
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    /// Show, update, or hide the notification for `state`.
    pub fn update(&mut self, state: PerspectiveState) {
        let Some(title) = title_for(state) else {
            self.hide();
            return;
        };

        let notification = Notification {
            title: title.to_string(),
            text: NOTIFICATION_TEXT.to_string(),
            ongoing: true,
            target: self.target.clone(),
        };
        match self.presenter.notify(NOTIFICATION_ID, &notification) {
            Ok(()) => self.showing = true,
            Err(e) => warn!(error = %e, %state, "failed to show notification"),
        }
    }

    /// Hide the notification if it is shown.
    pub fn hide(&mut self) {
        if !self.showing {
            return;
        }
        match self.presenter.cancel(NOTIFICATION_ID) {
            Ok(()) => self.showing = false,
            Err(e) => warn!(error = %e, "failed to cancel notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perspective_platform::mock::{MockPresenter, NotificationRecord};

    #[test]
    fn titles_follow_state() {
        assert_eq!(title_for(PerspectiveState::Stopped), None);
        assert_eq!(
            title_for(PerspectiveState::Running),
            Some("Desktop is running")
        );
        assert!(title_for(PerspectiveState::Starting)
            .unwrap()
            .contains("starting"));
        assert!(title_for(PerspectiveState::Stopping)
            .unwrap()
            .contains("stopping"));
    }

    #[test]
    fn shows_updates_and_hides() {
        let presenter = MockPresenter::new();
        let mut notification = DesktopNotification::new(
            Arc::new(presenter.clone()),
            Some("perspective-dashboard".to_string()),
        );

        // Nothing shown yet: hiding is a no-op.
        notification.update(PerspectiveState::Stopped);
        assert!(presenter.history().is_empty());

        notification.update(PerspectiveState::Starting);
        notification.update(PerspectiveState::Running);
        let shown = presenter.shown(NOTIFICATION_ID).unwrap();
        assert_eq!(shown.title, "Desktop is running");
        assert!(shown.ongoing);
        assert_eq!(shown.target.as_deref(), Some("perspective-dashboard"));

        notification.update(PerspectiveState::Stopped);
        assert!(!notification.is_showing());
        assert!(presenter.shown(NOTIFICATION_ID).is_none());
        assert_eq!(
            presenter.history().last(),
            Some(&NotificationRecord::Cancelled(NOTIFICATION_ID))
        );
    }
}
