//! Message and room model.
//!
//! These types are the subset of backend state the client needs for
//! rendering a room view. They carry no transport concerns; the REST and
//! hub layers convert their wire representations into these.

use serde::{Deserialize, Serialize};

/// Room identifier, assigned by the backend.
pub type RoomId = u64;

/// User identifier, assigned by the backend.
pub type UserId = u64;

/// Message identifier.
///
/// An optimistic send is keyed by a client-generated [`MessageId::Local`]
/// until the server-confirmed copy arrives under a [`MessageId::Server`]
/// id; reconciliation swaps one for the other in place. Keeping the two
/// namespaces as a tagged union makes the swap exhaustive: a local id can
/// never be mistaken for a server id, and server ids are unique per room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageId {
    /// Client-generated temporary id for a message awaiting confirmation.
    Local(u64),
    /// Server-assigned id, unique within its room.
    Server(u64),
}

impl MessageId {
    /// Whether this is a client-generated temporary id.
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(id) => write!(f, "local:{id}"),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

/// Delivery status of a message as known to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Sent optimistically, no server confirmation yet.
    Pending,
    /// Confirmed by the server (or received from it).
    Confirmed,
    /// Send failed or timed out; the user may retry.
    Failed,
}

/// A chat message in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Room this message belongs to.
    pub room_id: RoomId,
    /// Sender's user id.
    pub sender_id: UserId,
    /// Sender's display name.
    pub sender_name: String,
    /// Message body as displayed.
    pub body: String,
    /// Original body when `body` holds a translated rendition.
    pub original_body: Option<String>,
    /// Creation time, unix milliseconds.
    pub sent_at_ms: u64,
    /// Delivery status.
    pub status: DeliveryStatus,
}

impl ChatMessage {
    /// Create an optimistic local message in [`DeliveryStatus::Pending`].
    #[must_use]
    pub fn optimistic(
        local_id: u64,
        room_id: RoomId,
        sender_id: UserId,
        sender_name: impl Into<String>,
        body: impl Into<String>,
        sent_at_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::Local(local_id),
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            body: body.into(),
            original_body: None,
            sent_at_ms,
            status: DeliveryStatus::Pending,
        }
    }

    /// Replace the body with a translated rendition, keeping the original.
    ///
    /// Idempotent with respect to the original: translating an already
    /// translated message preserves the first original body.
    #[must_use]
    pub fn with_translation(mut self, translated: impl Into<String>) -> Self {
        let translated = translated.into();
        if self.original_body.is_none() {
            self.original_body = Some(std::mem::replace(&mut self.body, translated));
        } else {
            self.body = translated;
        }
        self
    }
}

/// Room metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// A room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
}

/// An announcement posted to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Announcement identifier.
    pub id: u64,
    /// Room the announcement targets.
    pub room_id: RoomId,
    /// Posting user.
    pub sender_id: UserId,
    /// Title line.
    pub title: String,
    /// Body content.
    pub content: String,
    /// Marked important by the poster.
    pub important: bool,
    /// Creation time, unix milliseconds.
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_translation_keeps_first_original() {
        let msg = ChatMessage::optimistic(1, 42, 7, "ada", "hei", 1000);

        let translated = msg.with_translation("hello");
        assert_eq!(translated.body, "hello");
        assert_eq!(translated.original_body.as_deref(), Some("hei"));

        let retranslated = translated.with_translation("hallo");
        assert_eq!(retranslated.body, "hallo");
        assert_eq!(retranslated.original_body.as_deref(), Some("hei"));
    }

    #[test]
    fn message_id_display() {
        assert_eq!(MessageId::Local(3).to_string(), "local:3");
        assert_eq!(MessageId::Server(3).to_string(), "3");
        assert!(MessageId::Local(3).is_local());
        assert!(!MessageId::Server(3).is_local());
    }
}
