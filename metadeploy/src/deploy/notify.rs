//! Run completion notifications

use tracing::{info, warn};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// Receives a short message when a run finishes
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, title: &str, body: &str);
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotificationLevel, title: &str, body: &str) {
        match level {
            NotificationLevel::Success => info!("{}: {}", title, body),
            NotificationLevel::Warning | NotificationLevel::Error => warn!("{}: {}", title, body),
        }
    }
}
