//! Server-initiated notifications.

use serde_json::Value;

/// A notification pushed by the server (`blockconnected`, `reorganization`, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Vec<Value>,
}

/// Receives notifications for the lifetime of a session.
///
/// Called from the session's reader task, so implementations must return
/// quickly; hand slow work off to another task.
pub trait NotificationHandler: Send + Sync + 'static {
    fn on_notification(&self, notification: Notification);
}

/// Handler for sessions that do not subscribe to anything.
pub struct IgnoreNotifications;

impl NotificationHandler for IgnoreNotifications {
    fn on_notification(&self, notification: Notification) {
        tracing::trace!(method = %notification.method, "ignoring notification");
    }
}
