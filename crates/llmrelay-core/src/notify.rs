//! Notification sink trait

use serde::{Deserialize, Serialize};

/// A user-facing informational message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Fire-and-forget notification delivery.
///
/// Implementations must not block and must swallow their own failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
