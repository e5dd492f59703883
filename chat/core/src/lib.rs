//! Agent Chat Core - Client-Side Conversation Sessions
//!
//! This crate holds the client side of a chat conversation with a remote
//! agent: the message list, the in-progress draft, the progress flags and a
//! diagnostics log, plus the controller that keeps all of it consistent while
//! messages travel over an asynchronous transport. It has no terminal or GUI
//! dependencies; a surface renders snapshots and forwards intents.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Surfaces                              │
//! │        ┌──────────────┐        ┌──────────────────────┐       │
//! │        │  agent-chat  │        │  Tests / Headless    │       │
//! │        │    (CLI)     │        │                      │       │
//! │        └──────┬───────┘        └──────────┬───────────┘       │
//! │               └──────────┬────────────────┘                   │
//! │              SessionIntent (up) / SessionSnapshot (down)      │
//! └──────────────────────────┼────────────────────────────────────┘
//!                            │
//! ┌──────────────────────────┼────────────────────────────────────┐
//! │                  SessionController                            │
//! │  ┌────────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ Conversation   │  │ LogRecorder  │  │ ReplyCorrelation │   │
//! │  │ Store          │  │              │  │                  │   │
//! │  └────────────────┘  └──────────────┘  └──────────────────┘   │
//! └──────────────────────────┬────────────────────────────────────┘
//!                            │ AgentTransport
//!               ┌────────────┴─────────────┐
//!        ┌──────┴───────┐          ┌───────┴────────┐
//!        │ HttpTransport│          │ InProcess      │
//!        │ (agent API)  │          │ (embedded/test)│
//!        └──────────────┘          └────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionController`]: Owns one conversation with one agent
//! - [`ConversationStore`]: Messages, draft and progress flags
//! - [`LogRecorder`]: Append-only diagnostics log
//! - [`AgentTransport`]: Connection to the agent service
//! - [`Notifier`]: User-visible error banners
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use agent_chat_core::{
//!     SessionController, SessionConfig, TracingNotifier,
//!     transport::{HttpTransport, HttpTransportConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = HttpTransport::new(HttpTransportConfig::default())?;
//!     let mut session = SessionController::new(
//!         Arc::new(transport),
//!         Arc::new(TracingNotifier),
//!         SessionConfig::default(),
//!     );
//!
//!     session.start("general", "Assistant Général").await?;
//!     session.submit("Bonjour");
//!     while session.store().is_awaiting_reply() {
//!         session.next_event().await;
//!     }
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`agents`]: Catalog of known agents and API routing
//! - [`config`]: TOML/env/CLI configuration
//! - [`controller`]: Session lifecycle and submission flow
//! - [`correlation`]: Matching replies to requests
//! - [`events`]: Intents sent from surfaces
//! - [`log`]: Diagnostics log
//! - [`messages`]: Message model
//! - [`notify`]: Error banners
//! - [`store`]: Conversation state
//! - [`transport`]: Transports to the agent service

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agents;
pub mod config;
pub mod controller;
pub mod correlation;
pub mod events;
pub mod log;
pub mod messages;
pub mod notify;
pub mod store;
pub mod transport;

// Re-exports for convenience
pub use agents::{find_agent, AgentIdentity, AgentKind, AgentProfile, KNOWN_AGENTS};
pub use config::{load_config, ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use controller::{
    LifecycleState, SessionConfig, SessionController, SessionError, SessionSnapshot,
};
pub use correlation::{ArrivalOrder, ReplyCorrelation};
pub use events::SessionIntent;
pub use log::{LogEntry, LogEntryId, LogKind, LogRecorder};
pub use messages::{ChatMessage, MessageId, MessageRole, SessionId};
pub use notify::{ChannelNotifier, Notification, Notifier, TracingNotifier};
pub use store::{ConversationState, ConversationStore, DRAFT_CHAR_LIMIT};
pub use transport::{AgentTransport, TransportError};
