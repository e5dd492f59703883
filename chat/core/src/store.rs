//! Conversation Store
//!
//! Pure state container for what a surface renders: the message list, the
//! input draft and the two progress flags. It holds no business logic; the
//! [`SessionController`](crate::controller::SessionController) is the only
//! writer, through the crate-private mutation methods.

use serde::{Deserialize, Serialize};

use crate::messages::ChatMessage;

/// Advisory draft length enforced by surfaces, never by the core
pub const DRAFT_CHAR_LIMIT: usize = 1000;

/// Renderable conversation state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Messages in event-processing order
    pub messages: Vec<ChatMessage>,
    /// Current unsent input
    pub draft: String,
    /// A send is in flight
    pub is_submitting: bool,
    /// The agent has not replied yet
    pub is_awaiting_reply: bool,
}

/// Owner of the [`ConversationState`] for one session
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full state
    #[must_use]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Messages in order
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.state.messages
    }

    /// Current draft
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.state.draft
    }

    /// Draft length in characters
    #[must_use]
    pub fn draft_char_count(&self) -> usize {
        self.state.draft.chars().count()
    }

    /// Whether the draft is past the advisory limit
    #[must_use]
    pub fn draft_exceeds_limit(&self) -> bool {
        self.draft_char_count() > DRAFT_CHAR_LIMIT
    }

    /// Whether a send is in flight
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.state.is_submitting
    }

    /// Whether a reply is still expected
    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.state.is_awaiting_reply
    }

    /// Append a message
    ///
    /// Keeps timestamps non-decreasing: a message stamped earlier than the
    /// last stored one (remote clock skew) takes the last stored timestamp.
    pub(crate) fn append_message(&mut self, mut message: ChatMessage) {
        if let Some(last) = self.state.messages.last() {
            if message.timestamp < last.timestamp {
                tracing::debug!(
                    message_id = %message.id,
                    "Clamping out-of-order message timestamp"
                );
                message.timestamp = last.timestamp;
            }
        }
        self.state.messages.push(message);
    }

    /// Replace the draft
    pub(crate) fn set_draft(&mut self, draft: impl Into<String>) {
        self.state.draft = draft.into();
    }

    /// Set both progress flags
    pub(crate) fn set_flags(&mut self, is_submitting: bool, is_awaiting_reply: bool) {
        self.state.is_submitting = is_submitting;
        self.state.is_awaiting_reply = is_awaiting_reply;
    }

    /// Start over for a new session
    pub(crate) fn reset(&mut self) {
        self.state = ConversationState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_append_preserves_order() {
        let mut store = ConversationStore::new();
        store.append_message(ChatMessage::user("one"));
        store.append_message(ChatMessage::assistant("two"));

        let contents: Vec<_> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn test_append_clamps_earlier_timestamp() {
        let mut store = ConversationStore::new();
        let first = ChatMessage::user("first");
        let first_stamp = first.timestamp;
        store.append_message(first);

        let mut skewed = ChatMessage::assistant("skewed");
        skewed.timestamp = first_stamp - Duration::seconds(30);
        store.append_message(skewed);

        assert_eq!(store.messages()[1].timestamp, first_stamp);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut store = ConversationStore::new();
        store.set_flags(true, true);
        store.set_flags(false, true);
        assert!(!store.is_submitting());
        assert!(store.is_awaiting_reply());
    }

    #[test]
    fn test_draft_limit_is_advisory() {
        let mut store = ConversationStore::new();
        store.set_draft("x".repeat(DRAFT_CHAR_LIMIT + 1));
        assert!(store.draft_exceeds_limit());
        assert_eq!(store.draft_char_count(), DRAFT_CHAR_LIMIT + 1);

        store.set_draft("ç".repeat(DRAFT_CHAR_LIMIT));
        assert!(!store.draft_exceeds_limit());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = ConversationStore::new();
        store.append_message(ChatMessage::user("hi"));
        store.set_draft("draft");
        store.set_flags(true, true);
        store.reset();
        assert_eq!(store.state(), &ConversationState::default());
    }
}
