//! User-visible notification content.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Key under which a notification is shown, updated, and cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct NotificationId(pub u32);

/// A persistent notification as handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Notification {
    pub title: String,
    pub text: String,
    /// Cannot be dismissed by the user.
    pub ongoing: bool,
    /// What to open when the notification is tapped.
    pub target: Option<String>,
}
