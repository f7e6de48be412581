//! Real-time hub boundary.
//!
//! The hub is an external collaborator: an externally supplied library
//! owns the transport, its reconnection policy, and delivery ordering.
//! This module defines the trait the rest of the client programs against
//! and the events the hub pushes back.

use async_trait::async_trait;
use palaver_core::{ChatMessage, Member, RoomId};
use tokio::sync::mpsc;

use crate::error::{ConnectionError, LeaveError, RoomJoinError, SendError};

/// Events pushed by the hub over a live connection.
///
/// Delivered in hub order; no ordering guarantee is made relative to
/// locally-issued sends, so receivers reconcile by message id.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A message was broadcast to a joined room (including echoes of our
    /// own sends, carrying their server-assigned ids).
    MessageReceived(ChatMessage),

    /// A user joined a room we are in.
    UserJoined {
        /// Room the user joined.
        room_id: RoomId,
        /// The joining member.
        member: Member,
    },

    /// A user left a room we are in.
    ///
    /// The hub reports leaves by display name only; receivers map the name
    /// back to the member set they track.
    UserLeft {
        /// Room the user left.
        room_id: RoomId,
        /// Leaving user's display name.
        username: String,
    },

    /// The connection dropped; the transport is retrying on its own.
    ///
    /// Room membership is not preserved across reconnects and must be
    /// re-established explicitly after [`HubEvent::Reconnected`].
    ConnectionLost {
        /// Drop detail from the transport.
        reason: String,
    },

    /// The transport re-established the connection.
    Reconnected,
}

/// The externally supplied real-time hub connection.
///
/// Implementations wrap the actual hub client library. All methods are
/// asynchronous and must never block the caller's thread; automatic
/// reconnection is the implementation's responsibility and is reported
/// through [`HubEvent::ConnectionLost`] / [`HubEvent::Reconnected`] on
/// the event channel returned by [`HubTransport::connect`].
#[async_trait]
pub trait HubTransport: Send + Sync + 'static {
    /// Negotiate and start the connection with a bearer token.
    ///
    /// Returns the channel on which the hub pushes events for the lifetime
    /// of the connection. The channel closing means the connection is gone
    /// for good (the transport gave up retrying).
    async fn connect(
        &self,
        bearer_token: &str,
    ) -> Result<mpsc::Receiver<HubEvent>, ConnectionError>;

    /// Ask the hub to add this client to a room's broadcast group.
    async fn join_room(&self, room_id: RoomId) -> Result<(), RoomJoinError>;

    /// Ask the hub to remove this client from a room's broadcast group.
    async fn leave_room(&self, room_id: RoomId) -> Result<(), LeaveError>;

    /// Send a message body to a room.
    ///
    /// Delivery confirmation arrives as a [`HubEvent::MessageReceived`]
    /// echo with the server-assigned id, not as a return value.
    async fn send_message(&self, room_id: RoomId, body: &str) -> Result<(), SendError>;
}
