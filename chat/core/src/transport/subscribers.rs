//! Subscriber Registry
//!
//! Shared bookkeeping for transports that fan inbound messages out to
//! registered handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::messages::ChatMessage;

use super::traits::{MessageHandler, Subscription};

type HandlerMap = HashMap<u64, MessageHandler>;

/// Registry of message handlers
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    handlers: Arc<RwLock<HandlerMap>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    ///
    /// The returned subscription holds only a weak reference, so it does not
    /// keep the registry alive.
    pub fn subscribe(&self, handler: MessageHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.write().insert(id, handler);
        tracing::debug!(subscriber = id, "Message handler registered");

        let handlers: Weak<RwLock<HandlerMap>> = Arc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                if handlers.write().remove(&id).is_some() {
                    tracing::debug!(subscriber = id, "Message handler removed");
                }
            }
        })
    }

    /// Deliver a message to every registered handler
    ///
    /// Handlers run outside the lock so they may subscribe or unsubscribe.
    /// Returns how many handlers were invoked.
    pub fn publish(&self, message: &ChatMessage) -> usize {
        let handlers: Vec<MessageHandler> = self.handlers.read().values().cloned().collect();
        for handler in &handlers {
            handler(message.clone());
        }
        handlers.len()
    }

    /// Number of registered handlers
    #[must_use]
    pub fn count(&self) -> usize {
        self.handlers.read().len()
    }
}
