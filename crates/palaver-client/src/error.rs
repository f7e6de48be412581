//! Error types for the client collaborators.
//!
//! Strongly-typed errors per failure surface: establishing the real-time
//! link, joining a room, sending a message, leaving a room. Delivery-
//! affecting errors (join, send) are surfaced to the user; leave failures
//! are logged and swallowed by the connection handle so navigation is
//! never blocked.

use palaver_core::RoomId;
use thiserror::Error;

/// Errors establishing the real-time hub connection.
///
/// Surfaced as a banner; the underlying transport owns automatic retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No session token in secure storage; the user must authenticate.
    #[error("no session token in secure storage")]
    MissingToken,

    /// The hub rejected the bearer token.
    #[error("authentication rejected: {reason}")]
    AuthRejected {
        /// Rejection detail from the hub.
        reason: String,
    },

    /// The hub could not be reached.
    #[error("network failure: {reason}")]
    Network {
        /// Underlying transport detail.
        reason: String,
    },
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Network failures are retried by the transport; a missing or rejected
    /// token needs the user to re-authenticate first.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Errors joining a room.
///
/// Surfaced to the user, who may retry manually.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomJoinError {
    /// No live connection; the caller must `connect()` first or retry.
    #[error("not connected to the hub")]
    NotConnected,

    /// The hub refused the join command.
    #[error("join rejected for room {room_id}: {reason}")]
    Rejected {
        /// Room the join targeted.
        room_id: RoomId,
        /// Rejection detail from the hub.
        reason: String,
    },
}

/// Errors sending a message.
///
/// The caller owns retry and optimistic-entry reconciliation; the affected
/// message is marked failed locally rather than silently dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// No live connection.
    #[error("not connected to the hub")]
    NotConnected,

    /// The send could not be delivered to the hub.
    #[error("transport failure: {reason}")]
    Transport {
        /// Underlying transport detail.
        reason: String,
    },
}

/// Errors leaving a room.
///
/// Never surfaced: the connection handle logs and swallows these so
/// closing a room view cannot block on the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaveError {
    /// The hub refused the leave command.
    #[error("leave rejected for room {room_id}: {reason}")]
    Rejected {
        /// Room the leave targeted.
        room_id: RoomId,
        /// Rejection detail from the hub.
        reason: String,
    },

    /// The leave could not be delivered to the hub.
    #[error("transport failure: {reason}")]
    Transport {
        /// Underlying transport detail.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        assert!(ConnectionError::Network { reason: "timeout".to_string() }.is_transient());
    }

    #[test]
    fn auth_errors_are_fatal() {
        assert!(!ConnectionError::MissingToken.is_transient());
        assert!(
            !ConnectionError::AuthRejected { reason: "expired".to_string() }.is_transient()
        );
    }
}
