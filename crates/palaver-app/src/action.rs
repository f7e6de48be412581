//! Session side-effects and intents.
//!
//! This module defines the [`SessionAction`] enum, which represents
//! instructions produced by the [`crate::RoomSession`] state machine for
//! the runtime to execute.

use palaver_core::RoomId;

/// Actions produced by the room session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Establish the hub connection (idempotent).
    Connect,

    /// Join a room's broadcast group.
    Join {
        /// Room to join.
        room_id: RoomId,
    },

    /// Leave a room's broadcast group, best-effort.
    Leave {
        /// Room to leave.
        room_id: RoomId,
    },

    /// Hand a message to the hub.
    SendToHub {
        /// Target room.
        room_id: RoomId,
        /// Local id of the optimistic entry awaiting its echo.
        local_id: u64,
        /// Message body.
        body: String,
    },

    /// Fetch room metadata and history from the REST collaborator.
    ///
    /// The result must come back as a
    /// [`SessionEvent::HistoryFetched`](crate::SessionEvent::HistoryFetched)
    /// carrying the same generation token.
    FetchHistory {
        /// Room to fetch.
        room_id: RoomId,
        /// Generation token for stale-result detection.
        generation: u64,
    },

    /// Warm the translation cache for the most recent visible messages.
    TranslateEager {
        /// Target language code.
        language: String,
    },

    /// Drop all cached translations (room view closed).
    ClearTranslations,

    /// Re-render the UI from the session view.
    Render,
}
