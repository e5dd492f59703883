//! User Notifications
//!
//! Fire-and-forget side channel for user-visible error banners. The session
//! controller uses it for exactly one purpose: telling the user a message
//! could not be sent (or, with a reply timeout configured, was never
//! answered).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Something failed
    Error,
}

/// A notification for a toast surface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification level
    pub level: NotifyLevel,
    /// Message content
    pub message: String,
}

/// Sink for user-visible notifications
pub trait Notifier: Send + Sync {
    /// Show an error banner; must not block or fail
    fn notify_error(&self, text: &str);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify_error(&self, text: &str) {
        (**self).notify_error(text);
    }
}

/// Notifier that only writes to the process log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, text: &str) {
        tracing::warn!(notification = %text, "User notification");
    }
}

/// Notifier that forwards to a channel read by the surface
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the surface should drain
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify_error(&self, text: &str) {
        let notification = Notification {
            level: NotifyLevel::Error,
            message: text.to_string(),
        };
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}
