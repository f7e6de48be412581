//! Ordered message store for the active room.
//!
//! Holds the authoritative message list the room view renders from.
//! Messages are kept in arrival order (history seeds ascending by
//! timestamp); [`MessageStore::snapshot`] reverses for display, most
//! recent first.
//!
//! # Invariants
//!
//! - No two entries ever share an id, across any sequence of `append`,
//!   `append_optimistic`, `reconcile`, and `seed_history` calls.
//! - Reconciling an optimistic entry preserves its list position where
//!   possible; a message is never visible twice and never silently lost.

use crate::types::{ChatMessage, DeliveryStatus, MessageId};

/// In-memory ordered message list with optimistic insertion and
/// de-duplication.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    /// Arrival-ordered messages (oldest first).
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, de-duplicating by id.
    ///
    /// A message whose id is already present replaces the existing entry in
    /// place (a server re-delivery reconciles itself); otherwise the message
    /// is appended in arrival order.
    pub fn append(&mut self, message: ChatMessage) {
        match self.position(message.id) {
            Some(idx) => self.messages[idx] = message,
            None => self.messages.push(message),
        }
    }

    /// Insert a client-generated optimistic message.
    ///
    /// The entry must carry a [`MessageId::Local`] id; it becomes visible
    /// immediately with [`DeliveryStatus::Pending`] status, before any
    /// server acknowledgment.
    pub fn append_optimistic(&mut self, message: ChatMessage) {
        debug_assert!(message.id.is_local());
        debug_assert_eq!(message.status, DeliveryStatus::Pending);
        self.append(message);
    }

    /// Replace the optimistic entry `local_id` with the server-confirmed
    /// message, preserving its list position.
    ///
    /// If the confirmed id is already present elsewhere (the server copy
    /// arrived first), the optimistic entry is removed instead so no
    /// duplicate is ever visible. If the optimistic entry is gone, the
    /// confirmed message is appended so it is never lost.
    ///
    /// Returns `true` when an optimistic entry was found and resolved.
    pub fn reconcile(&mut self, local_id: u64, confirmed: ChatMessage) -> bool {
        let Some(idx) = self.position(MessageId::Local(local_id)) else {
            tracing::debug!(local_id, "reconcile target missing, appending confirmed copy");
            self.append(confirmed);
            return false;
        };

        if self.position(confirmed.id).is_some_and(|existing| existing != idx) {
            self.messages.remove(idx);
        } else {
            self.messages[idx] = confirmed;
        }
        true
    }

    /// Mark the optimistic entry `local_id` as [`DeliveryStatus::Failed`].
    ///
    /// Returns `false` when no such entry exists (already reconciled).
    pub fn mark_failed(&mut self, local_id: u64) -> bool {
        match self.position(MessageId::Local(local_id)) {
            Some(idx) => {
                self.messages[idx].status = DeliveryStatus::Failed;
                true
            },
            None => false,
        }
    }

    /// Merge a historical batch, sorted ascending by timestamp, in front of
    /// messages that already arrived live.
    ///
    /// Ids already present (live arrivals racing the fetch, or a re-fetch
    /// after reconnect) are skipped.
    pub fn seed_history(&mut self, history: Vec<ChatMessage>) {
        let mut merged: Vec<ChatMessage> = Vec::with_capacity(history.len() + self.messages.len());
        for message in history {
            if self.position(message.id).is_none()
                && !merged.iter().any(|m: &ChatMessage| m.id == message.id)
            {
                merged.push(message);
            }
        }
        merged.append(&mut self.messages);
        self.messages = merged;
    }

    /// Display-ordered copy of the messages, most recent first.
    ///
    /// Pure: no side effects.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().rev().cloned().collect()
    }

    /// Messages in storage (arrival) order, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.position(id).map(|idx| &self.messages[idx])
    }

    /// Whether a message with this id is present.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.position(id).is_some()
    }

    /// Number of messages held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages (room view closed).
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }
}
