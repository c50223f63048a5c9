//! Backend notifications
//!
//! Builds the user-facing notifications for fallbacks, connection tests and
//! availability changes, and provides the stock [`NotificationSink`]s.
//! Sinks are fire-and-forget: `notify` never blocks and never fails.

use llmrelay_core::{AvailabilityChange, Backend, Notification, NotificationSink};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub const FALLBACK_TITLE: &str = "Backend Fallback";
pub const TEST_PASSED_TITLE: &str = "Connection Test Passed";
pub const TEST_FAILED_TITLE: &str = "Connection Test Failed";
pub const STATUS_CHANGED_TITLE: &str = "Backend Status Changed";

/// Notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Enable/disable notifications globally
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fallback message template
    #[serde(default = "default_fallback_template")]
    pub fallback_template: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            fallback_template: default_fallback_template(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_fallback_template() -> String {
    "Switched to ${new_backend} after ${original_backend} failed".to_string()
}

/// Substitute template variables in a notification message
///
/// Supported variables:
/// - `${original_backend}`: backend that was selected when the call started
/// - `${new_backend}`: backend that answered
pub fn substitute_template_variables(
    template: &str,
    original_backend: &str,
    new_backend: &str,
) -> String {
    template
        .replace("${original_backend}", original_backend)
        .replace("${new_backend}", new_backend)
}

impl NotificationConfig {
    pub fn fallback(&self, original: Backend, new: Backend) -> Notification {
        Notification::new(
            FALLBACK_TITLE,
            substitute_template_variables(
                &self.fallback_template,
                original.display_name(),
                new.display_name(),
            ),
        )
    }
}

pub fn connection_test_passed(backend: Backend, response_time: Duration) -> Notification {
    Notification::new(
        TEST_PASSED_TITLE,
        format!(
            "{}: {:.2}s",
            backend.display_name(),
            response_time.as_secs_f64()
        ),
    )
}

pub fn connection_test_failed(backend: Backend, error: &str) -> Notification {
    Notification::new(
        TEST_FAILED_TITLE,
        format!("{}: {}", backend.display_name(), error),
    )
}

pub fn status_changed(change: &AvailabilityChange) -> Notification {
    Notification::new(
        STATUS_CHANGED_TITLE,
        format!(
            "{} is now {}",
            change.backend.display_name(),
            change.status_label()
        ),
    )
}

/// Writes notifications as `info` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            title = %notification.title,
            message = %notification.message,
            "Notification"
        );
    }
}

/// Forwards notifications to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Notifications with the given title
    pub fn with_title(&self, title: &str) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.title == title)
            .collect()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}
