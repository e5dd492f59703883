//! Transport Layer to the Agent Service
//!
//! Provides abstraction over the mechanisms that carry messages to agents:
//! - `InProcess`: Direct channel communication (embedded agents, tests)
//! - `Http`: The agent REST API
//!
//! # Design Philosophy
//!
//! The transport separates the communication mechanism from session logic.
//! A send only confirms delivery; replies flow back through subscriptions,
//! so the session controller behaves the same whether the reply arrives in
//! the send's response body, over a push channel, or much later.

pub mod config;
pub mod http;
pub mod in_process;
pub mod subscribers;
pub mod traits;

// Re-exports for convenience
pub use config::{HttpTransportConfig, DEFAULT_API_URL};
pub use http::{HttpTransport, RemoteAgent};
pub use in_process::{AckMode, AgentEndpoint, AgentRequest, InProcessTransport};
pub use subscribers::SubscriberRegistry;
pub use traits::{AgentTransport, MessageHandler, Subscription, TransportError};
