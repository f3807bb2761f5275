//! User-facing notification channel.
//!
//! Publishing is fire-and-forget: no acknowledgment, and a closed receiver
//! is not an error.

use tokio::sync::mpsc;
use tracing::{debug, warn};

pub trait Notifier: Send + Sync {
    fn publish(&self, message: &str);
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn publish(&self, message: &str) {
        (**self).publish(message);
    }
}

/// Forwards messages to whoever holds the receiver (usually the UI loop).
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn publish(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            debug!(message, "Notification dropped, receiver closed");
        }
    }
}

/// Emits each message as a warning event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn publish(&self, message: &str) {
        warn!(target: "sessionkit::notify", "{}", message);
    }
}
