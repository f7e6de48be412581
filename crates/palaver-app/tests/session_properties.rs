//! Property-based tests for the room session state machine.
//!
//! Drives the session with arbitrary event sequences and verifies that
//! the message-identity and lifecycle invariants hold after every step.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use palaver_app::{RoomSession, SessionEvent, SessionPhase};
use palaver_client::rest::{MessageRecord, RoomDetail};
use palaver_client::{HistoryFetchError, HubEvent, RoomJoinError, SendError};
use palaver_core::{
    ChatMessage, DeliveryStatus, Environment, MessageId, RoomId, UserId,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

const ME: UserId = 7;
const PEER: UserId = 2;
const BODIES: [&str; 3] = ["one", "two", "three"];
const SENTINEL: &str = "held message";

/// Synthetic monotonic instant driven by explicit tick events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SimInstant(u64);

impl std::ops::Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(rhs.0))
    }
}

/// Deterministic environment: synthetic clock, counting local ids.
#[derive(Clone, Default)]
struct SimEnv {
    millis: Arc<AtomicU64>,
    ids: Arc<AtomicU64>,
}

impl SimEnv {
    /// Advance the clock and return the new instant.
    fn advance(&self, by: Duration) -> SimInstant {
        let millis = by.as_millis() as u64;
        SimInstant(self.millis.fetch_add(millis, Ordering::Relaxed) + millis)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.millis.load(Ordering::Relaxed))
    }

    fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    fn unix_millis(&self) -> u64 {
        1_700_000_000_000 + self.millis.load(Ordering::Relaxed)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let value = self.ids.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes = value.to_be_bytes();
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }
}

/// Abstract session inputs, mapped to events at apply time.
#[derive(Debug, Clone)]
enum Ev {
    Open(RoomId),
    Joined,
    JoinFailed,
    ConnectionLost,
    Reconnected,
    PeerMessage { room_id: RoomId, id: u64, body: usize },
    OwnEcho { room_id: RoomId, id: u64, body: usize },
    Send { body: usize },
    RetrySend { local_id: u64 },
    SendFailed { local_id: u64 },
    HistoryOk { generation: u64, ids: Vec<u64> },
    HistoryErr { generation: u64 },
    RefreshHistory,
    Tick { secs: u64 },
    Close,
    LeaveCompleted,
}

/// Small id and room ranges force collisions between operations.
fn ev_strategy() -> impl Strategy<Value = Ev> {
    prop_oneof![
        2 => (1u64..3).prop_map(Ev::Open),
        3 => Just(Ev::Joined),
        1 => Just(Ev::JoinFailed),
        2 => Just(Ev::ConnectionLost),
        2 => Just(Ev::Reconnected),
        3 => (1u64..3, 0u64..24, 0usize..BODIES.len())
            .prop_map(|(room_id, id, body)| Ev::PeerMessage { room_id, id, body }),
        2 => (1u64..3, 0u64..24, 0usize..BODIES.len())
            .prop_map(|(room_id, id, body)| Ev::OwnEcho { room_id, id, body }),
        3 => (0usize..BODIES.len()).prop_map(|body| Ev::Send { body }),
        1 => (0u64..8).prop_map(|local_id| Ev::RetrySend { local_id }),
        1 => (0u64..8).prop_map(|local_id| Ev::SendFailed { local_id }),
        2 => (0u64..3, prop::collection::vec(0u64..24, 0..6))
            .prop_map(|(generation, ids)| Ev::HistoryOk { generation, ids }),
        1 => (0u64..3).prop_map(|generation| Ev::HistoryErr { generation }),
        1 => Just(Ev::RefreshHistory),
        2 => (0u64..30).prop_map(|secs| Ev::Tick { secs }),
        2 => Just(Ev::Close),
        2 => Just(Ev::LeaveCompleted),
    ]
}

fn server_msg(room_id: RoomId, id: u64, sender_id: UserId, body: &str) -> ChatMessage {
    ChatMessage {
        id: MessageId::Server(id),
        room_id,
        sender_id,
        sender_name: if sender_id == ME { "me".to_string() } else { "peer".to_string() },
        body: body.to_string(),
        original_body: None,
        sent_at_ms: id * 100,
        status: DeliveryStatus::Confirmed,
    }
}

fn detail(room_id: RoomId, ids: &[u64]) -> RoomDetail {
    RoomDetail {
        id: room_id,
        name: "general".to_string(),
        description: String::new(),
        messages: ids
            .iter()
            .map(|&id| MessageRecord {
                id,
                sender_id: PEER,
                sender_name: "peer".to_string(),
                content: format!("m{id}"),
                sent_at_ms: id * 100,
            })
            .collect(),
        members: Vec::new(),
    }
}

/// Map an abstract input to a session event and feed it through.
///
/// History results are built for the currently open room, mirroring the
/// runtime contract that fetches are only issued for that room.
fn apply(session: &mut RoomSession<SimEnv>, env: &SimEnv, ev: Ev) {
    let event = match ev {
        Ev::Open(room_id) => SessionEvent::Open { room_id },
        Ev::Joined => SessionEvent::Joined,
        Ev::JoinFailed => SessionEvent::JoinFailed {
            error: RoomJoinError::Rejected { room_id: 1, reason: "denied".to_string() },
        },
        Ev::ConnectionLost => {
            SessionEvent::Hub(HubEvent::ConnectionLost { reason: "drop".to_string() })
        },
        Ev::Reconnected => SessionEvent::Hub(HubEvent::Reconnected),
        Ev::PeerMessage { room_id, id, body } => {
            SessionEvent::Hub(HubEvent::MessageReceived(server_msg(
                room_id,
                id,
                PEER,
                BODIES[body],
            )))
        },
        Ev::OwnEcho { room_id, id, body } => SessionEvent::Hub(HubEvent::MessageReceived(
            server_msg(room_id, id, ME, BODIES[body]),
        )),
        Ev::Send { body } => SessionEvent::SendRequested { body: BODIES[body].to_string() },
        Ev::RetrySend { local_id } => SessionEvent::RetrySend { local_id },
        Ev::SendFailed { local_id } => {
            SessionEvent::SendFailed { local_id, error: SendError::NotConnected }
        },
        Ev::HistoryOk { generation, ids } => {
            let room_id = session.room_id().unwrap_or(1);
            SessionEvent::HistoryFetched { generation, result: Ok(detail(room_id, &ids)) }
        },
        Ev::HistoryErr { generation } => SessionEvent::HistoryFetched {
            generation,
            result: Err(HistoryFetchError::Request { reason: "timeout".to_string() }),
        },
        Ev::RefreshHistory => SessionEvent::RefreshHistory,
        Ev::Tick { secs } => SessionEvent::Tick { now: env.advance(Duration::from_secs(secs)) },
        Ev::Close => SessionEvent::Close,
        Ev::LeaveCompleted => SessionEvent::LeaveCompleted,
    };
    let _ = session.handle(event);
}

/// Invariants that must hold after every event.
///
/// - No two visible messages share an id.
/// - A room is open exactly outside `Idle`; with no room open the store
///   is empty, and every visible message belongs to the open room.
/// - Local-id entries are never `Confirmed`; server-id entries always are.
fn check_invariants(session: &RoomSession<SimEnv>) -> Result<(), TestCaseError> {
    let snapshot = session.snapshot();

    let mut seen = HashSet::new();
    for message in &snapshot {
        prop_assert!(seen.insert(message.id), "duplicate id {}", message.id);
    }

    match session.room_id() {
        Some(room_id) => {
            prop_assert_ne!(session.phase(), SessionPhase::Idle);
            for message in &snapshot {
                prop_assert_eq!(message.room_id, room_id);
            }
        },
        None => {
            prop_assert_eq!(session.phase(), SessionPhase::Idle);
            prop_assert!(snapshot.is_empty());
        },
    }

    for message in &snapshot {
        if message.id.is_local() {
            prop_assert_ne!(message.status, DeliveryStatus::Confirmed);
        } else {
            prop_assert_eq!(message.status, DeliveryStatus::Confirmed);
        }
    }

    Ok(())
}

proptest! {
    #[test]
    fn prop_session_invariants_hold(events in prop::collection::vec(ev_strategy(), 0..64)) {
        let env = SimEnv::default();
        let mut session = RoomSession::new(env.clone(), ME, "me");

        for ev in events {
            apply(&mut session, &env, ev);
            check_invariants(&session)?;
        }
    }

    /// An optimistic send is visible exactly once, through reconnects,
    /// retries, ticks, and history seeds, until the room view closes.
    #[test]
    fn prop_pending_send_survives_until_close(
        events in prop::collection::vec(ev_strategy(), 0..48),
    ) {
        let env = SimEnv::default();
        let mut session = RoomSession::new(env.clone(), ME, "me");

        let _ = session.handle(SessionEvent::Open { room_id: 1 });
        let _ = session.handle(SessionEvent::Joined);
        let _ = session.handle(SessionEvent::SendRequested { body: SENTINEL.to_string() });

        for ev in events {
            if matches!(ev, Ev::Close) {
                continue;
            }
            apply(&mut session, &env, ev);

            let count = session
                .snapshot()
                .iter()
                .filter(|message| message.body == SENTINEL)
                .count();
            prop_assert_eq!(count, 1, "optimistic send disappeared or duplicated");
        }
    }
}
