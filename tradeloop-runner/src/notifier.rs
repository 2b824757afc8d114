//! Notification sinks.

use tradeloop_core::engine::Notifier;
use tracing::info;

/// Writes operator notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    channel: String,
}

impl LogNotifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(target: "tradeloop::notify", channel = %self.channel, "{message}");
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _message: &str) {}
}
