//! Notification presenter that writes to the log.

use parking_lot::Mutex;
use perspective_types::{Notification, NotificationId};
use tracing::info;

use crate::error::PlatformError;
use crate::NotificationPresenter;

/// [`NotificationPresenter`] for headless hosts: every show, update, and
/// cancel becomes an `info` event.
#[derive(Default)]
pub struct LogPresenter {
    shown: Mutex<Option<(NotificationId, Notification)>>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationPresenter for LogPresenter {
    fn notify(
        &self,
        id: NotificationId,
        notification: &Notification,
    ) -> Result<(), PlatformError> {
        let mut shown = self.shown.lock();
        if shown.as_ref().is_some_and(|(shown_id, n)| *shown_id == id && n == notification) {
            return Ok(());
        }
        info!(
            id = id.0,
            title = %notification.title,
            text = %notification.text,
            ongoing = notification.ongoing,
            target = ?notification.target,
            "notification"
        );
        *shown = Some((id, notification.clone()));
        Ok(())
    }

    fn cancel(&self, id: NotificationId) -> Result<(), PlatformError> {
        let mut shown = self.shown.lock();
        if shown.as_ref().is_some_and(|(shown_id, _)| *shown_id == id) {
            info!(id = id.0, "notification cancelled");
            *shown = None;
        }
        Ok(())
    }
}
