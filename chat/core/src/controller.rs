//! Session Controller - The Conversation Core
//!
//! The controller owns one conversation with one agent at a time. It:
//! - Connects and disconnects the transport
//! - Subscribes to agent replies
//! - Turns user submissions into transport sends
//! - Keeps the conversation store and the diagnostics log in step
//!
//! # Design Philosophy
//!
//! The controller is surface-agnostic. A surface forwards intents and reads
//! snapshots; it never mutates the store itself.
//!
//! All state changes happen on the controller's owner, through `&mut self`.
//! Work that completes elsewhere (a send settling, a reply arriving from a
//! transport task, a reply deadline) is posted to an inbox as a
//! `SessionEvent` and applied by [`SessionController::next_event`] or
//! [`SessionController::drain_events`]. Every event carries the epoch it was
//! produced in. Starting and closing a session bump the epoch, so anything
//! produced by an earlier session is discarded instead of touching the
//! current one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::agents::AgentIdentity;
use crate::correlation::{ArrivalOrder, ReplyCorrelation};
use crate::events::SessionIntent;
use crate::log::{LogEntry, LogKind, LogRecorder};
use crate::messages::{preview, ChatMessage, MessageId, SessionId};
use crate::notify::Notifier;
use crate::store::{ConversationState, ConversationStore};
use crate::transport::{AgentTransport, MessageHandler, Subscription, TransportError};

/// Banner shown when a message could not be delivered
pub const SEND_FAILURE_NOTICE: &str = "Failed to send message";

/// Banner shown when a reply never arrived
pub const REPLY_TIMEOUT_NOTICE: &str = "The agent did not reply in time";

/// Session configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Characters of message content kept in log previews
    pub preview_chars: usize,
    /// Give up waiting for a reply after this long (None waits forever)
    pub reply_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preview_chars: 100,
            reply_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Set the reply timeout
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }
}

/// Connection lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No session
    Disconnected,
    /// Waiting for the transport to connect
    Connecting,
    /// Ready to exchange messages
    Connected,
    /// Tearing down
    Closing,
}

impl LifecycleState {
    /// Short human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

/// Errors from session lifecycle operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not allowed in the current lifecycle state
    #[error("Session is {}", .0.description())]
    InvalidState(LifecycleState),

    /// The transport refused to connect
    #[error("Failed to connect to agent {agent_id}: {source}")]
    Connect {
        /// Agent the session was opened for
        agent_id: String,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },
}

/// Serializable view of a session for surfaces
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current session ID
    pub session_id: Option<SessionId>,
    /// Lifecycle state
    pub lifecycle: LifecycleState,
    /// Agent the session is attached to
    pub agent: Option<AgentIdentity>,
    /// Conversation state
    pub conversation: ConversationState,
    /// Whether the log inspector is shown
    pub log_view_visible: bool,
    /// Diagnostics log
    pub logs: Vec<LogEntry>,
}

/// Work completed outside the controller, waiting to be applied
#[derive(Debug)]
enum SessionEvent {
    /// A send finished
    SendSettled {
        epoch: u64,
        request: MessageId,
        result: Result<(), TransportError>,
    },
    /// The transport delivered a message
    Inbound { epoch: u64, message: ChatMessage },
    /// The reply deadline for a request passed
    ReplyDeadline { epoch: u64, request: MessageId },
}

impl SessionEvent {
    fn epoch(&self) -> u64 {
        match self {
            Self::SendSettled { epoch, .. }
            | Self::Inbound { epoch, .. }
            | Self::ReplyDeadline { epoch, .. } => *epoch,
        }
    }
}

/// Drives one conversation with one agent over a transport
pub struct SessionController<T: AgentTransport + ?Sized + 'static> {
    /// Transport to the agent service
    transport: Arc<T>,
    /// User-visible error banners
    notifier: Arc<dyn Notifier>,
    /// Configuration
    config: SessionConfig,
    /// Lifecycle state
    lifecycle: LifecycleState,
    /// Current session ID
    session_id: Option<SessionId>,
    /// Agent the session is attached to
    agent: Option<AgentIdentity>,
    /// Conversation state
    store: ConversationStore,
    /// Diagnostics log
    log: LogRecorder,
    /// Whether the log inspector is shown
    log_view_visible: bool,
    /// Which requests still expect a reply
    correlation: Box<dyn ReplyCorrelation>,
    /// Reply subscription for the current session
    subscription: Option<Subscription>,
    /// Reply deadline timers, one per acknowledged request still waiting
    deadlines: HashMap<MessageId, JoinHandle<()>>,
    /// Generation counter for discarding stale events
    epoch: u64,
    /// Inbox sender, cloned into tasks and handlers
    inbox_tx: mpsc::UnboundedSender<SessionEvent>,
    /// Inbox receiver
    inbox_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<T: AgentTransport + ?Sized + 'static> SessionController<T> {
    /// Create a controller matching replies by arrival order
    pub fn new(transport: Arc<T>, notifier: Arc<dyn Notifier>, config: SessionConfig) -> Self {
        Self::with_correlation(transport, notifier, config, Box::new(ArrivalOrder::new()))
    }

    /// Create a controller with a custom reply correlation strategy
    pub fn with_correlation(
        transport: Arc<T>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
        correlation: Box<dyn ReplyCorrelation>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            notifier,
            config,
            lifecycle: LifecycleState::Disconnected,
            session_id: None,
            agent: None,
            store: ConversationStore::new(),
            log: LogRecorder::new(),
            log_view_visible: false,
            correlation,
            subscription: None,
            deadlines: HashMap::new(),
            epoch: 0,
            inbox_tx,
            inbox_rx,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open a session with an agent
    ///
    /// Only valid while disconnected. Clears any previous conversation and
    /// log, connects the transport and subscribes to replies. On connect
    /// failure an error entry is recorded and the controller returns to
    /// `Disconnected`.
    pub async fn start(
        &mut self,
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        if self.lifecycle != LifecycleState::Disconnected {
            return Err(SessionError::InvalidState(self.lifecycle));
        }

        let agent = AgentIdentity::new(agent_id, agent_name);

        self.store.reset();
        self.log.reset();
        self.correlation.abandon_all();
        self.cancel_deadlines();
        self.discard_pending_events();
        self.epoch += 1;
        self.session_id = Some(SessionId::new());
        self.agent = Some(agent.clone());
        self.lifecycle = LifecycleState::Connecting;

        tracing::info!(
            agent_id = %agent.id,
            transport = self.transport.name(),
            "Connecting session"
        );

        if let Err(e) = self.transport.connect().await {
            self.log.record(
                LogKind::Error,
                format!("Failed to connect to agent {} ({})", agent.name, agent.id),
                Some(json!({ "error": e.to_string() })),
            );
            self.lifecycle = LifecycleState::Disconnected;
            return Err(SessionError::Connect {
                agent_id: agent.id,
                source: e,
            });
        }

        let tx = self.inbox_tx.clone();
        let epoch = self.epoch;
        let handler: MessageHandler = Arc::new(move |message| {
            // Receiver lives as long as the controller
            let _ = tx.send(SessionEvent::Inbound { epoch, message });
        });
        self.subscription = Some(self.transport.on_message(handler));
        self.lifecycle = LifecycleState::Connected;

        self.log.record(
            LogKind::Info,
            format!("Connected to agent {} ({})", agent.name, agent.id),
            Some(json!({
                "agent_id": agent.id,
                "agent_name": agent.name,
                "transport": self.transport.name(),
            })),
        );

        Ok(())
    }

    /// Close the session
    ///
    /// Idempotent: closing a disconnected controller does nothing. After
    /// close returns, nothing produced by the closed session (late replies,
    /// late send results, deadlines) touches the store or the log.
    pub async fn close(&mut self) {
        if self.lifecycle == LifecycleState::Disconnected {
            return;
        }

        // A previous close may have been cancelled mid-way; finish it quietly
        if self.lifecycle != LifecycleState::Closing {
            let name = self
                .agent
                .as_ref()
                .map_or_else(|| "agent".to_string(), |a| a.name.clone());
            self.log.record(
                LogKind::Info,
                format!("Closing session with {name}"),
                None,
            );
        }
        self.lifecycle = LifecycleState::Closing;

        self.epoch += 1;
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.correlation.abandon_all();
        self.cancel_deadlines();
        self.store.set_flags(false, false);

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(error = %e, "Transport disconnect failed");
        }

        self.discard_pending_events();
        self.lifecycle = LifecycleState::Disconnected;
        tracing::info!(session_id = ?self.session_id, "Session closed");
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Submit a message to the agent
    ///
    /// Ignored unless the session is connected, nothing is in flight and
    /// `text` has non-whitespace content. The user message is appended
    /// immediately; the send itself runs as a background task whose result
    /// is applied by [`Self::next_event`]. Must be called from within a
    /// Tokio runtime.
    ///
    /// Returns the ID of the appended user message when accepted.
    pub fn submit(&mut self, text: &str) -> Option<MessageId> {
        if self.lifecycle != LifecycleState::Connected {
            tracing::debug!(state = self.lifecycle.description(), "Submit ignored");
            return None;
        }
        if text.trim().is_empty() || self.store.is_submitting() {
            return None;
        }
        let agent_id = self.agent.as_ref()?.id.clone();

        let message = ChatMessage::user(text);
        let request = message.id;
        self.store.append_message(message);
        self.store.set_draft(String::new());
        self.store.set_flags(true, true);
        self.correlation.submitted(request);

        self.log.record(
            LogKind::Request,
            format!("Sending message to {agent_id}"),
            Some(json!({ "content": preview(text, self.config.preview_chars) })),
        );

        let transport = Arc::clone(&self.transport);
        let tx = self.inbox_tx.clone();
        let epoch = self.epoch;
        let content = text.to_string();
        tokio::spawn(async move {
            let result = transport.send_message(&content, &agent_id).await;
            let _ = tx.send(SessionEvent::SendSettled {
                epoch,
                request,
                result,
            });
        });

        Some(request)
    }

    /// Replace the draft text
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if self.lifecycle == LifecycleState::Connected {
            self.store.set_draft(text);
        }
    }

    /// Submit the current draft
    pub fn submit_draft(&mut self) -> Option<MessageId> {
        let text = self.store.draft().to_string();
        self.submit(&text)
    }

    /// Show or hide the log inspector; returns the new visibility
    pub fn toggle_log_view(&mut self) -> bool {
        self.log_view_visible = !self.log_view_visible;
        self.log_view_visible
    }

    /// Apply an intent from a surface
    pub async fn handle_intent(&mut self, intent: SessionIntent) -> Result<(), SessionError> {
        match intent {
            SessionIntent::Start {
                agent_id,
                agent_name,
            } => self.start(agent_id, agent_name).await?,
            SessionIntent::SetDraft { text } => self.set_draft(text),
            SessionIntent::Submit { text } => {
                self.submit(&text);
            }
            SessionIntent::SubmitDraft => {
                self.submit_draft();
            }
            SessionIntent::ToggleLogView => {
                self.toggle_log_view();
            }
            SessionIntent::Close => self.close().await,
        }
        Ok(())
    }

    // ========================================================================
    // Event processing
    // ========================================================================

    /// Wait for the next piece of background work and apply it
    ///
    /// Returns `false` if the event changed nothing, for instance because it
    /// belonged to an earlier session. Cancel-safe, so it can sit in a `tokio::select!` loop.
    pub async fn next_event(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    /// Apply every event that is ready without waiting; returns how many
    /// changed the session
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.inbox_rx.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    fn discard_pending_events(&mut self) {
        while self.inbox_rx.try_recv().is_ok() {}
    }

    fn apply(&mut self, event: SessionEvent) -> bool {
        if event.epoch() != self.epoch || self.lifecycle != LifecycleState::Connected {
            tracing::debug!(event = ?event, "Discarding stale session event");
            return false;
        }

        match event {
            SessionEvent::SendSettled {
                request,
                result: Ok(()),
                ..
            } => self.send_succeeded(request),
            SessionEvent::SendSettled {
                request,
                result: Err(e),
                ..
            } => self.send_failed(request, &e),
            SessionEvent::Inbound { message, .. } => return self.reply_received(message),
            SessionEvent::ReplyDeadline { request, .. } => return self.reply_deadline(request),
        }
        true
    }

    fn send_succeeded(&mut self, request: MessageId) {
        self.log
            .record(LogKind::Success, "Message delivered to agent", None);

        // The reply may already be here
        let awaiting = self.store.is_awaiting_reply();
        self.store.set_flags(false, awaiting);

        if let Some(timeout) = self.config.reply_timeout {
            if self.correlation.is_pending(request) {
                let tx = self.inbox_tx.clone();
                let epoch = self.epoch;
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = tx.send(SessionEvent::ReplyDeadline { epoch, request });
                });
                self.deadlines.insert(request, timer);
            }
        }
    }

    fn send_failed(&mut self, request: MessageId, error: &TransportError) {
        tracing::warn!(error = %error, request = %request, "Send failed");
        self.log.record(
            LogKind::Error,
            "Failed to send message",
            Some(json!({ "error": error.to_string() })),
        );
        self.notifier.notify_error(SEND_FAILURE_NOTICE);
        self.correlation.send_failed(request);
        self.store.set_flags(false, false);
    }

    fn reply_received(&mut self, message: ChatMessage) -> bool {
        if !message.is_assistant() {
            tracing::warn!(role = %message.role, "Ignoring non-assistant message from transport");
            return false;
        }

        let answers = self.correlation.reply_arrived(&message);
        if let Some(request) = answers {
            self.cancel_deadline(request);
        }
        let content_preview = preview(&message.content, self.config.preview_chars);
        tracing::debug!(reply = %message.id, answers = ?answers, "Reply received");

        let submitting = self.store.is_submitting();
        self.store.append_message(message);
        self.store.set_flags(submitting, false);

        self.log.record(
            LogKind::Response,
            "Reply received from agent",
            Some(json!({ "content": content_preview })),
        );
        true
    }

    fn reply_deadline(&mut self, request: MessageId) -> bool {
        self.deadlines.remove(&request);

        // A newer request is still inside its own timeout; keep its indicator
        if self.correlation.latest_pending() != Some(request) {
            if self.correlation.abandon(request) {
                tracing::debug!(request = %request, "Reply deadline passed for superseded request");
            }
            return false;
        }
        self.correlation.abandon(request);
        if !self.store.is_awaiting_reply() {
            tracing::debug!(request = %request, "Reply deadline passed after indicator cleared");
            return false;
        }

        let timeout_ms = self
            .config
            .reply_timeout
            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self.log.record(
            LogKind::Error,
            "No reply from agent before timeout",
            Some(json!({ "request": request.to_string(), "timeout_ms": timeout_ms })),
        );
        self.notifier.notify_error(REPLY_TIMEOUT_NOTICE);
        let submitting = self.store.is_submitting();
        self.store.set_flags(submitting, false);
        true
    }

    fn cancel_deadline(&mut self, request: MessageId) {
        if let Some(timer) = self.deadlines.remove(&request) {
            timer.abort();
        }
    }

    fn cancel_deadlines(&mut self) {
        for (_, timer) in self.deadlines.drain() {
            timer.abort();
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of reply deadline timers still running
    #[must_use]
    pub fn pending_deadlines(&self) -> usize {
        self.deadlines.len()
    }

    /// Lifecycle state
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Whether the session can exchange messages
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lifecycle == LifecycleState::Connected
    }

    /// Current session ID
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Agent the session is attached to
    #[must_use]
    pub fn agent(&self) -> Option<&AgentIdentity> {
        self.agent.as_ref()
    }

    /// Conversation store (read-only)
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Diagnostics log (read-only)
    #[must_use]
    pub fn log(&self) -> &LogRecorder {
        &self.log
    }

    /// Whether the log inspector is shown
    #[must_use]
    pub fn log_view_visible(&self) -> bool {
        self.log_view_visible
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Transport
    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Owned snapshot for rendering or serialization
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            lifecycle: self.lifecycle,
            agent: self.agent.clone(),
            conversation: self.store.state().clone(),
            log_view_visible: self.log_view_visible,
            logs: self.log.entries().to_vec(),
        }
    }
}
