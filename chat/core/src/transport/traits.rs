//! Transport Traits
//!
//! The contract between the session controller and whatever carries
//! messages to and from the agents. Sending only confirms delivery; replies
//! come back separately through a subscription.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::ChatMessage;

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish the underlying channel
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The channel is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// The message could not be delivered
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The agent API refused the message
    #[error("Agent rejected message: {0}")]
    Rejected(String),

    /// Unexpected HTTP status from the agent API
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation attempted in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            Self::SerializationError(err.to_string())
        } else {
            Self::SendFailed(err.to_string())
        }
    }
}

/// Callback invoked once per inbound assistant message
pub type MessageHandler = Arc<dyn Fn(ChatMessage) + Send + Sync>;

/// Registration of a [`MessageHandler`]
///
/// Calling [`Subscription::unsubscribe`] or dropping the value deregisters
/// the handler. Deregistering more than once is harmless.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap the closure that removes the handler
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to remove
    #[must_use]
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    /// Deregister the handler
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Whether the handler is still registered through this value
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Transport to the agent service
///
/// Implementations are shared (`Arc`) and must tolerate repeated
/// `connect`/`disconnect` calls.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Transport name for diagnostics (e.g. "http")
    fn name(&self) -> &str;

    /// Establish the underlying channel (idempotent)
    async fn connect(&self) -> Result<(), TransportError>;

    /// Release the underlying channel (idempotent)
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Deliver `content` to the agent `agent_id`
    ///
    /// Resolves on delivery acknowledgment. The agent's reply is delivered
    /// to subscribers, never returned here.
    async fn send_message(&self, content: &str, agent_id: &str) -> Result<(), TransportError>;

    /// Register a handler for inbound assistant messages
    fn on_message(&self, handler: MessageHandler) -> Subscription;
}
