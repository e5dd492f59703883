//! In-Process Transport
//!
//! Channel-based transport for embedding an agent in the same process, and
//! for driving sessions deterministically in tests.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, mut endpoint) = InProcessTransport::new_pair();
//!
//! // Give the transport to a SessionController, keep the endpoint
//! tokio::spawn(async move {
//!     while let Some(request) = endpoint.recv().await {
//!         endpoint.reply(format!("echo: {}", request.content));
//!     }
//! });
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::messages::ChatMessage;

use super::subscribers::SubscriberRegistry;
use super::traits::{AgentTransport, MessageHandler, Subscription, TransportError};

/// How sends are acknowledged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckMode {
    /// A send resolves as soon as the request is queued
    Immediate,
    /// A send resolves when the endpoint calls [`AgentRequest::acknowledge`]
    /// or [`AgentRequest::fail`]
    Manual,
}

/// A message received by the agent side
#[derive(Debug)]
pub struct AgentRequest {
    /// Target agent
    pub agent_id: String,
    /// Message content
    pub content: String,
    ack: Option<oneshot::Sender<Result<(), String>>>,
}

impl AgentRequest {
    /// Resolve the sender's `send_message` successfully
    pub fn acknowledge(mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(Ok(()));
        }
    }

    /// Resolve the sender's `send_message` with a rejection
    pub fn fail(mut self, reason: impl Into<String>) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(Err(reason.into()));
        }
    }
}

/// Shared between the transport and its endpoint
#[derive(Default)]
struct Shared {
    subscribers: SubscriberRegistry,
    reject_reason: Mutex<Option<String>>,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

/// In-process transport using tokio channels
pub struct InProcessTransport {
    request_tx: mpsc::Sender<AgentRequest>,
    ack_mode: AckMode,
    shared: Arc<Shared>,
}

/// Agent side of an [`InProcessTransport`]
pub struct AgentEndpoint {
    request_rx: mpsc::Receiver<AgentRequest>,
    shared: Arc<Shared>,
}

impl InProcessTransport {
    /// Create a transport/endpoint pair with immediate acknowledgment
    #[must_use]
    pub fn new_pair() -> (Self, AgentEndpoint) {
        Self::new_pair_with(AckMode::Immediate, 100)
    }

    /// Create a pair whose sends wait for the endpoint to settle them
    #[must_use]
    pub fn new_pair_with_manual_ack() -> (Self, AgentEndpoint) {
        Self::new_pair_with(AckMode::Manual, 100)
    }

    /// Create a pair with explicit acknowledgment mode and channel capacity
    #[must_use]
    pub fn new_pair_with(ack_mode: AckMode, capacity: usize) -> (Self, AgentEndpoint) {
        let (request_tx, request_rx) = mpsc::channel(capacity);
        let shared = Arc::new(Shared::default());

        let transport = Self {
            request_tx,
            ack_mode,
            shared: Arc::clone(&shared),
        };
        let endpoint = AgentEndpoint { request_rx, shared };

        (transport, endpoint)
    }

    /// Whether `connect` has been called more recently than `disconnect`
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// How many times `connect` was called
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.shared.connect_calls.load(Ordering::SeqCst)
    }

    /// How many times `disconnect` was called
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.shared.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Number of registered message handlers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.count()
    }
}

#[async_trait]
impl AgentTransport for InProcessTransport {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.shared.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(&self, content: &str, agent_id: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::InvalidState(
                "Transport not connected".to_string(),
            ));
        }

        if let Some(reason) = self.shared.reject_reason.lock().clone() {
            return Err(TransportError::Rejected(reason));
        }

        let (ack, settled) = match self.ack_mode {
            AckMode::Immediate => (None, None),
            AckMode::Manual => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
        };

        self.request_tx
            .send(AgentRequest {
                agent_id: agent_id.to_string(),
                content: content.to_string(),
                ack,
            })
            .await
            .map_err(|_| TransportError::SendFailed("Agent endpoint closed".to_string()))?;

        match settled {
            None => Ok(()),
            Some(rx) => match rx.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(reason)) => Err(TransportError::Rejected(reason)),
                Err(_) => Err(TransportError::ConnectionClosed),
            },
        }
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        self.shared.subscribers.subscribe(handler)
    }
}

impl AgentEndpoint {
    /// Wait for the next request
    pub async fn recv(&mut self) -> Option<AgentRequest> {
        self.request_rx.recv().await
    }

    /// Take a request if one is queued
    pub fn try_recv(&mut self) -> Option<AgentRequest> {
        self.request_rx.try_recv().ok()
    }

    /// Publish an assistant reply; returns how many handlers received it
    pub fn reply(&self, content: impl Into<String>) -> usize {
        self.deliver(ChatMessage::assistant(content))
    }

    /// Publish an arbitrary message
    pub fn deliver(&self, message: ChatMessage) -> usize {
        self.shared.subscribers.publish(&message)
    }

    /// Make every subsequent send fail with `reason`
    pub fn reject_sends(&self, reason: impl Into<String>) {
        *self.shared.reject_reason.lock() = Some(reason.into());
    }

    /// Undo [`AgentEndpoint::reject_sends`]
    pub fn accept_sends(&self) {
        *self.shared.reject_reason.lock() = None;
    }
}
