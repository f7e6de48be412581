//! Session input events.
//!
//! This module defines [`SessionEvent`], the comprehensive set of inputs
//! that drive the [`crate::RoomSession`] state machine.
//!
//! Events originate from three sources:
//! - User intents (open, send, retry, close, language switch).
//! - Collaborator results fed back by the runtime (connect/join outcomes,
//!   history fetches, hub send failures).
//! - Hub pushes and periodic ticks.

use palaver_client::rest::{HistoryFetchError, RoomDetail};
use palaver_client::{ConnectionError, HubEvent, RoomJoinError, SendError};
use palaver_core::{RoomId, RoomInfo};

/// Events processed by the room session state machine.
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and synthetic test clocks.
#[derive(Debug, Clone)]
pub enum SessionEvent<I = std::time::Instant> {
    /// User opened a room view.
    Open {
        /// Room to open.
        room_id: RoomId,
    },

    /// The hub accepted our join command.
    Joined,

    /// The join command failed.
    JoinFailed {
        /// Why the join failed.
        error: RoomJoinError,
    },

    /// Establishing the hub connection failed.
    ConnectFailed {
        /// Why the connection failed.
        error: ConnectionError,
    },

    /// A history fetch resolved.
    ///
    /// Carries the generation token issued with the fetch; results from a
    /// generation other than the current one are discarded.
    HistoryFetched {
        /// Generation token from the issuing [`crate::SessionAction`].
        generation: u64,
        /// Fetch outcome.
        result: Result<RoomDetail, HistoryFetchError>,
    },

    /// Event pushed by the hub.
    Hub(HubEvent),

    /// User submitted a message body.
    SendRequested {
        /// Message body.
        body: String,
    },

    /// User retried a failed message.
    RetrySend {
        /// Local id of the failed entry.
        local_id: u64,
    },

    /// Handing a send to the hub failed immediately.
    SendFailed {
        /// Local id of the affected entry.
        local_id: u64,
        /// Why the send failed.
        error: SendError,
    },

    /// User requested a fresh history fetch (inline retry affordance).
    RefreshHistory,

    /// User switched the translation target language.
    LanguageChanged {
        /// Target language code.
        language: String,
    },

    /// Room metadata was updated out of band (settings screen).
    RoomUpdated {
        /// Fresh metadata.
        info: RoomInfo,
    },

    /// Transient status text for the UI banner.
    Notice {
        /// Message to display.
        message: String,
    },

    /// Periodic tick for timeout processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// User closed the room view.
    Close,

    /// The best-effort leave finished (successfully or not).
    LeaveCompleted,
}
