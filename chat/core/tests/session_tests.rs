//! Session controller behavior tests
//!
//! These tests drive a `SessionController` against the in-process transport
//! and verify the conversation guarantees end to end:
//! - Message ordering and progress flags
//! - Single in-flight submission
//! - Failure recovery and notifications
//! - Teardown: idempotent close, no late mutations
//! - Optional reply timeout

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use agent_chat_core::controller::{REPLY_TIMEOUT_NOTICE, SEND_FAILURE_NOTICE};
use agent_chat_core::transport::{
    AckMode, AgentEndpoint, AgentTransport, InProcessTransport, MessageHandler, Subscription,
    TransportError,
};
use agent_chat_core::{
    ChannelNotifier, LifecycleState, LogKind, MessageRole, Notification, SessionConfig,
    SessionController, SessionError, SessionIntent,
};

// =============================================================================
// Test Harness
// =============================================================================

struct Harness {
    controller: SessionController<InProcessTransport>,
    transport: Arc<InProcessTransport>,
    endpoint: AgentEndpoint,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

fn harness_with(ack_mode: AckMode, config: SessionConfig) -> Harness {
    let (transport, endpoint) = InProcessTransport::new_pair_with(ack_mode, 16);
    let transport = Arc::new(transport);
    let (notifier, notifications) = ChannelNotifier::new();
    let controller = SessionController::new(Arc::clone(&transport), Arc::new(notifier), config);
    Harness {
        controller,
        transport,
        endpoint,
        notifications,
    }
}

fn harness() -> Harness {
    harness_with(AckMode::Immediate, SessionConfig::default())
}

fn drain_notifications(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n.message);
    }
    out
}

fn contents<T: AgentTransport + ?Sized + 'static>(
    controller: &SessionController<T>,
) -> Vec<(MessageRole, String)> {
    controller
        .store()
        .messages()
        .iter()
        .map(|m| (m.role, m.content.clone()))
        .collect()
}

/// Transport whose subscriptions never unregister, to prove the controller
/// ignores messages from a closed session on its own
struct LeakyTransport {
    inner: InProcessTransport,
    leaked: Mutex<Vec<Subscription>>,
}

#[async_trait]
impl AgentTransport for LeakyTransport {
    fn name(&self) -> &str {
        "leaky"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.inner.disconnect().await
    }

    async fn send_message(&self, content: &str, agent_id: &str) -> Result<(), TransportError> {
        self.inner.send_message(content, agent_id).await
    }

    fn on_message(&self, handler: MessageHandler) -> Subscription {
        self.leaked.lock().push(self.inner.on_message(handler));
        Subscription::noop()
    }
}

/// Transport that cannot reach the agent service
struct UnreachableTransport;

#[async_trait]
impl AgentTransport for UnreachableTransport {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        Err(TransportError::ConnectionFailed(
            "connection refused".to_string(),
        ))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_message(&self, _content: &str, _agent_id: &str) -> Result<(), TransportError> {
        Err(TransportError::ConnectionClosed)
    }

    fn on_message(&self, _handler: MessageHandler) -> Subscription {
        Subscription::noop()
    }
}

// =============================================================================
// Round Trip
// =============================================================================

#[tokio::test]
async fn test_round_trip() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);
    assert_eq!(h.controller.lifecycle(), LifecycleState::Connected);
    assert_eq!(h.transport.connect_calls(), 1);

    assert!(h.controller.submit("Bonjour").is_some());
    assert!(h.controller.store().is_submitting());
    assert!(h.controller.store().is_awaiting_reply());

    let request = h.endpoint.recv().await.unwrap();
    assert_eq!(request.agent_id, "general");
    assert_eq!(request.content, "Bonjour");

    assert!(h.controller.next_event().await);
    assert!(!h.controller.store().is_submitting());
    assert!(h.controller.store().is_awaiting_reply());

    assert_eq!(h.endpoint.reply("Salut!"), 1);
    assert!(h.controller.next_event().await);

    assert_eq!(
        contents(&h.controller),
        vec![
            (MessageRole::User, "Bonjour".to_string()),
            (MessageRole::Assistant, "Salut!".to_string()),
        ]
    );
    assert!(!h.controller.store().is_submitting());
    assert!(!h.controller.store().is_awaiting_reply());
    assert_eq!(
        h.controller.log().kinds(),
        vec![
            LogKind::Info,
            LogKind::Request,
            LogKind::Success,
            LogKind::Response
        ]
    );
    assert!(drain_notifications(&mut h.notifications).is_empty());
}

#[tokio::test]
async fn test_log_previews_content() {
    let mut h = harness_with(
        AckMode::Immediate,
        SessionConfig {
            preview_chars: 5,
            reply_timeout: None,
        },
    );
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour tout le monde");
    let request = h.controller.log().latest().unwrap().clone();
    assert_eq!(request.kind, LogKind::Request);
    assert_eq!(request.details.unwrap()["content"], "Bonjo...");

    // Full content still goes to the agent and the store
    assert_eq!(
        h.endpoint.recv().await.unwrap().content,
        "Bonjour tout le monde"
    );
    assert_eq!(
        h.controller.store().messages()[0].content,
        "Bonjour tout le monde"
    );
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_messages_appear_in_arrival_order() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("a");
    assert!(h.controller.next_event().await);
    h.endpoint.reply("ra");
    assert!(h.controller.next_event().await);

    h.controller.submit("b");
    assert!(h.controller.next_event().await);
    // Acknowledged but unanswered: a new submission is allowed
    h.controller.submit("c");
    assert!(h.controller.next_event().await);

    h.endpoint.reply("rb");
    h.endpoint.reply("rc");
    assert_eq!(h.controller.drain_events(), 2);

    let order: Vec<String> = contents(&h.controller).into_iter().map(|(_, c)| c).collect();
    assert_eq!(order, vec!["a", "ra", "b", "c", "rb", "rc"]);

    let messages = h.controller.store().messages();
    assert!(messages
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

// =============================================================================
// Submission Guards
// =============================================================================

#[tokio::test]
async fn test_whitespace_submit_ignored() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    assert_eq!(h.controller.submit("   \n\t "), None);
    assert_eq!(h.controller.submit(""), None);

    assert!(h.controller.store().messages().is_empty());
    assert!(!h.controller.store().is_submitting());
    assert_eq!(h.controller.log().kinds(), vec![LogKind::Info]);
    assert!(h.endpoint.try_recv().is_none());
}

#[tokio::test]
async fn test_single_in_flight() {
    let mut h = harness_with(AckMode::Manual, SessionConfig::default());
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    assert!(h.controller.submit("one").is_some());
    assert_eq!(h.controller.submit("two"), None);
    assert_eq!(h.controller.store().messages().len(), 1);
    assert_eq!(
        h.controller.log().kinds(),
        vec![LogKind::Info, LogKind::Request]
    );

    let request = h.endpoint.recv().await.unwrap();
    assert_eq!(request.content, "one");
    assert!(h.endpoint.try_recv().is_none());

    request.acknowledge();
    assert!(h.controller.next_event().await);
    assert!(!h.controller.store().is_submitting());

    assert!(h.controller.submit("two").is_some());
    assert_eq!(h.endpoint.recv().await.unwrap().content, "two");
    assert_eq!(h.controller.store().messages().len(), 2);
}

#[tokio::test]
async fn test_submit_draft_intent() {
    let mut h = harness();
    assert_ok!(
        h.controller
            .handle_intent(SessionIntent::Start {
                agent_id: "code".to_string(),
                agent_name: "Agent de Code".to_string(),
            })
            .await
    );

    assert_ok!(
        h.controller
            .handle_intent(SessionIntent::SetDraft {
                text: "fn main() {}".to_string(),
            })
            .await
    );
    assert_eq!(h.controller.store().draft_char_count(), 12);

    assert_ok!(h.controller.handle_intent(SessionIntent::SubmitDraft).await);
    assert_eq!(h.controller.store().draft(), "");

    let request = h.endpoint.recv().await.unwrap();
    assert_eq!(request.agent_id, "code");
    assert_eq!(request.content, "fn main() {}");
}

// =============================================================================
// Failure Recovery
// =============================================================================

#[tokio::test]
async fn test_send_failure_recovers() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);
    h.endpoint.reject_sends("agent offline");

    h.controller.submit("Bonjour");
    assert!(h.controller.next_event().await);

    assert!(!h.controller.store().is_submitting());
    assert!(!h.controller.store().is_awaiting_reply());
    // The user message stays
    assert_eq!(h.controller.store().messages().len(), 1);
    assert_eq!(h.controller.log().count(LogKind::Error), 1);
    assert_eq!(h.controller.log().count(LogKind::Success), 0);

    let error = h.controller.log().latest().unwrap();
    assert!(error.details.as_ref().unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("agent offline"));

    assert_eq!(
        drain_notifications(&mut h.notifications),
        vec![SEND_FAILURE_NOTICE.to_string()]
    );

    // Input is usable again
    h.endpoint.accept_sends();
    assert!(h.controller.submit("Encore").is_some());
}

#[tokio::test]
async fn test_dropped_ack_is_a_failure() {
    let mut h = harness_with(AckMode::Manual, SessionConfig::default());
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    drop(h.endpoint.recv().await.unwrap());
    assert!(h.controller.next_event().await);

    assert!(!h.controller.store().is_submitting());
    assert_eq!(h.controller.log().count(LogKind::Error), 1);
    assert_eq!(drain_notifications(&mut h.notifications).len(), 1);
}

#[tokio::test]
async fn test_connect_failure() {
    let (notifier, mut notifications) = ChannelNotifier::new();
    let mut controller = SessionController::new(
        Arc::new(UnreachableTransport),
        Arc::new(notifier),
        SessionConfig::default(),
    );

    let err = controller
        .start("general", "Assistant Général")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Connect { .. }));
    assert_eq!(controller.lifecycle(), LifecycleState::Disconnected);
    assert_eq!(controller.log().kinds(), vec![LogKind::Error]);

    assert_eq!(controller.submit("Bonjour"), None);
    assert!(controller.store().messages().is_empty());
    assert!(notifications.try_recv().is_err());
}

// =============================================================================
// Reply Ordering Relative to Acknowledgment
// =============================================================================

#[tokio::test]
async fn test_reply_before_ack() {
    let mut h = harness_with(AckMode::Manual, SessionConfig::default());
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    let request = h.endpoint.recv().await.unwrap();

    h.endpoint.reply("Salut!");
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.store().messages().len(), 2);
    assert!(h.controller.store().is_submitting());
    assert!(!h.controller.store().is_awaiting_reply());

    request.acknowledge();
    assert!(h.controller.next_event().await);
    assert!(!h.controller.store().is_submitting());
    assert!(!h.controller.store().is_awaiting_reply());
    assert_eq!(
        h.controller.log().kinds(),
        vec![
            LogKind::Info,
            LogKind::Request,
            LogKind::Response,
            LogKind::Success
        ]
    );
}

#[tokio::test]
async fn test_unsolicited_reply_appended() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.endpoint.reply("Bienvenue");
    assert!(h.controller.next_event().await);

    assert_eq!(
        contents(&h.controller),
        vec![(MessageRole::Assistant, "Bienvenue".to_string())]
    );
    assert!(!h.controller.store().is_awaiting_reply());
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut h = harness();

    // Never started: nothing to do
    h.controller.close().await;
    assert_eq!(h.transport.disconnect_calls(), 0);

    assert_ok!(h.controller.start("general", "Assistant Général").await);
    assert_eq!(h.transport.subscriber_count(), 1);

    h.controller.close().await;
    h.controller.close().await;

    assert_eq!(h.transport.disconnect_calls(), 1);
    assert_eq!(h.transport.subscriber_count(), 0);
    assert_eq!(h.controller.lifecycle(), LifecycleState::Disconnected);
    assert_eq!(h.controller.log().kinds(), vec![LogKind::Info, LogKind::Info]);
}

#[tokio::test]
async fn test_reply_after_close_not_delivered() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);
    h.controller.close().await;

    assert_eq!(h.endpoint.reply("too late"), 0);
    assert_eq!(h.controller.drain_events(), 0);
    assert!(h.controller.store().messages().is_empty());
}

#[tokio::test]
async fn test_reply_after_close_ignored_even_if_transport_leaks() {
    let (inner, endpoint) = InProcessTransport::new_pair();
    let transport = Arc::new(LeakyTransport {
        inner,
        leaked: Mutex::new(Vec::new()),
    });
    let (notifier, _notifications) = ChannelNotifier::new();
    let mut controller = SessionController::new(
        Arc::clone(&transport),
        Arc::new(notifier),
        SessionConfig::default(),
    );

    assert_ok!(controller.start("general", "Assistant Général").await);
    controller.close().await;
    let log_len = controller.log().len();

    // The handler is still registered with the leaky transport
    assert_eq!(endpoint.reply("too late"), 1);
    assert!(!controller.next_event().await);

    assert!(controller.store().messages().is_empty());
    assert_eq!(controller.log().len(), log_len);
}

#[tokio::test]
async fn test_late_send_result_after_close_ignored() {
    let mut h = harness_with(AckMode::Manual, SessionConfig::default());
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    let request = h.endpoint.recv().await.unwrap();
    h.controller.close().await;
    assert!(!h.controller.store().is_submitting());

    request.acknowledge();
    assert!(!h.controller.next_event().await);

    assert_eq!(h.controller.log().count(LogKind::Success), 0);
    assert!(!h.controller.store().is_submitting());
    assert!(!h.controller.store().is_awaiting_reply());
}

#[tokio::test]
async fn test_late_failure_after_close_not_notified() {
    let mut h = harness_with(AckMode::Manual, SessionConfig::default());
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    let request = h.endpoint.recv().await.unwrap();
    h.controller.close().await;

    request.fail("shutting down");
    assert!(!h.controller.next_event().await);

    assert_eq!(h.controller.log().count(LogKind::Error), 0);
    assert!(drain_notifications(&mut h.notifications).is_empty());
}

#[tokio::test]
async fn test_restart_starts_fresh() {
    let mut h = harness();
    assert_ok!(h.controller.start("general", "Assistant Général").await);
    let first_session = h.controller.session_id().cloned();

    h.controller.submit("Bonjour");
    assert!(h.controller.next_event().await);
    h.controller.close().await;

    assert_ok!(h.controller.start("code", "Agent de Code").await);
    assert_ne!(h.controller.session_id().cloned(), first_session);
    assert_eq!(h.controller.agent().unwrap().id, "code");
    assert!(h.controller.store().messages().is_empty());
    assert_eq!(h.controller.log().kinds(), vec![LogKind::Info]);
}

// =============================================================================
// Reply Timeout
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reply_timeout_clears_indicator() {
    let mut h = harness_with(
        AckMode::Immediate,
        SessionConfig::default().with_reply_timeout(Duration::from_secs(5)),
    );
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    assert!(h.controller.next_event().await);
    assert!(h.controller.store().is_awaiting_reply());

    // Paused clock auto-advances to the deadline
    assert!(h.controller.next_event().await);
    assert!(!h.controller.store().is_awaiting_reply());
    assert_eq!(h.controller.log().count(LogKind::Error), 1);
    assert_eq!(
        drain_notifications(&mut h.notifications),
        vec![REPLY_TIMEOUT_NOTICE.to_string()]
    );

    // A reply arriving afterwards is still shown
    h.endpoint.reply("Désolé du retard");
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.store().messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reply_in_time_cancels_timeout() {
    let mut h = harness_with(
        AckMode::Immediate,
        SessionConfig::default().with_reply_timeout(Duration::from_secs(5)),
    );
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.pending_deadlines(), 1);
    h.endpoint.reply("Salut!");
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.pending_deadlines(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.controller.drain_events(), 0);
    assert_eq!(h.controller.log().count(LogKind::Error), 0);
    assert!(drain_notifications(&mut h.notifications).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_reply_timers() {
    let mut h = harness_with(
        AckMode::Immediate,
        SessionConfig::default().with_reply_timeout(Duration::from_secs(5)),
    );
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    h.controller.submit("Bonjour");
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.pending_deadlines(), 1);

    h.controller.close().await;
    assert_eq!(h.controller.pending_deadlines(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.controller.drain_events(), 0);
    assert!(drain_notifications(&mut h.notifications).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_older_deadline_keeps_newer_request_waiting() {
    let mut h = harness_with(
        AckMode::Immediate,
        SessionConfig::default().with_reply_timeout(Duration::from_secs(5)),
    );
    assert_ok!(h.controller.start("general", "Assistant Général").await);

    // First request acknowledged at t=0, its deadline is t=5
    assert!(h.controller.submit("first").is_some());
    assert!(h.controller.next_event().await);
    tokio::time::sleep(Duration::from_secs(4)).await;

    // Second request acknowledged at t=4, its deadline is t=9
    assert!(h.controller.submit("second").is_some());
    assert!(h.controller.next_event().await);
    assert_eq!(h.controller.pending_deadlines(), 2);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.controller.drain_events(), 0);
    assert!(h.controller.store().is_awaiting_reply());
    assert_eq!(h.controller.log().count(LogKind::Error), 0);
    assert!(drain_notifications(&mut h.notifications).is_empty());
    assert_eq!(h.controller.pending_deadlines(), 1);

    // The second request still times out on its own schedule
    assert!(h.controller.next_event().await);
    assert!(!h.controller.store().is_awaiting_reply());
    assert_eq!(h.controller.log().count(LogKind::Error), 1);
    assert_eq!(
        drain_notifications(&mut h.notifications),
        vec![REPLY_TIMEOUT_NOTICE.to_string()]
    );
    assert_eq!(h.controller.pending_deadlines(), 0);
}
