//! Reply Correlation
//!
//! Decides which outstanding request an inbound reply answers. Replies carry
//! no request ID today, so the default strategy matches purely by arrival
//! order. The controller only talks to the [`ReplyCorrelation`] trait, so a
//! transport that starts tagging replies can get a matching strategy without
//! changing the controller's public contract.

use std::collections::VecDeque;

use crate::messages::{ChatMessage, MessageId};

/// Tracks requests that still expect a reply
pub trait ReplyCorrelation: Send {
    /// A request was sent (or is being sent)
    fn submitted(&mut self, request: MessageId);

    /// The send for `request` failed; no reply will come
    fn send_failed(&mut self, request: MessageId);

    /// A reply arrived; returns the request it answers, if any
    fn reply_arrived(&mut self, reply: &ChatMessage) -> Option<MessageId>;

    /// Stop waiting for `request` (e.g. after a reply timeout)
    fn abandon(&mut self, request: MessageId) -> bool;

    /// Stop waiting for everything
    fn abandon_all(&mut self);

    /// Whether `request` is still waiting
    fn is_pending(&self, request: MessageId) -> bool;

    /// Whether any request is still waiting
    fn is_awaiting(&self) -> bool;

    /// The most recently submitted request that is still waiting
    fn latest_pending(&self) -> Option<MessageId>;
}

/// Matches each reply to the oldest outstanding request
#[derive(Clone, Debug, Default)]
pub struct ArrivalOrder {
    pending: VecDeque<MessageId>,
}

impl ArrivalOrder {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests still waiting
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl ReplyCorrelation for ArrivalOrder {
    fn submitted(&mut self, request: MessageId) {
        self.pending.push_back(request);
    }

    fn send_failed(&mut self, request: MessageId) {
        self.pending.retain(|id| *id != request);
    }

    fn reply_arrived(&mut self, _reply: &ChatMessage) -> Option<MessageId> {
        self.pending.pop_front()
    }

    fn abandon(&mut self, request: MessageId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|id| *id != request);
        self.pending.len() != before
    }

    fn abandon_all(&mut self) {
        self.pending.clear();
    }

    fn is_pending(&self, request: MessageId) -> bool {
        self.pending.contains(&request)
    }

    fn is_awaiting(&self) -> bool {
        !self.pending.is_empty()
    }

    fn latest_pending(&self) -> Option<MessageId> {
        self.pending.back().copied()
    }
}
