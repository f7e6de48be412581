//! Room session state machine.
//!
//! This module defines [`RoomSession`], which manages the message state of
//! a single chat room view completely decoupled from I/O.
//!
//! This is a pure state machine: it consumes [`crate::SessionEvent`] inputs
//! and produces [`crate::SessionAction`] instructions for the runtime to
//! execute. It is the sole mutator of its message store; consistency is
//! achieved by serializing mutations through this event handling, not by
//! locking.
//!
//! # State machine
//!
//! ```text
//! ┌──────┐  Open   ┌─────────┐  Joined   ┌────────┐  Close  ┌─────────┐
//! │ Idle │────────>│ Joining │──────────>│ Active │────────>│ Leaving │
//! └──────┘         └─────────┘           └────────┘         └─────────┘
//!    ↑                  │ ConnectionLost      │ ConnectionLost    │
//!    │ JoinFailed/      ↓                     ↓                   │
//!    │ ConnectFailed ┌──────────────┐  Reconnected→Join           │
//!    │<──────────────│ Reconnecting │──────────────┐              │
//!    │               └──────────────┘     (Joined) │              │
//!    │                                             ↓              │
//!    └─────────────────────────────────────── LeaveCompleted <────┘
//! ```
//!
//! Sends while `Joining`/`Reconnecting` appear optimistically at once but
//! are queued and flushed in arrival order when `Active` is reached; sends
//! issued while `Active` carry an acknowledgment deadline and flip to
//! failed when no server echo arrives in time.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use palaver_client::HubEvent;
use palaver_core::{
    ChatMessage, DeliveryStatus, Environment, Member, MessageStore, RoomId, RoomInfo, UserId,
};

use crate::{SessionAction, SessionEvent};

/// Time allowed for a server echo before a sent message is marked failed.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of most-recent messages translated eagerly on language switch.
pub const DEFAULT_EAGER_TRANSLATE_WINDOW: usize = 20;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Acknowledgment deadline for issued sends.
    pub send_timeout: Duration,
    /// Eager translation window (remaining messages translate lazily).
    pub eager_translate_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            eager_translate_window: DEFAULT_EAGER_TRANSLATE_WINDOW,
        }
    }
}

/// Room session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No room open.
    #[default]
    Idle,
    /// Connecting and joining the room.
    Joining,
    /// Joined; messages flow.
    Active,
    /// Connection dropped; transport retrying, membership to re-establish.
    Reconnecting,
    /// Best-effort leave in progress.
    Leaving,
}

/// A send waiting for the session to reach [`SessionPhase::Active`].
#[derive(Debug, Clone)]
struct QueuedSend {
    local_id: u64,
    body: String,
}

/// A send handed to the hub, awaiting its server echo.
#[derive(Debug, Clone)]
struct InFlightSend<I> {
    local_id: u64,
    body: String,
    issued_at: I,
    failed: bool,
}

/// Renderable view of the session, most recent message first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// Room metadata when known.
    pub room: Option<RoomInfo>,
    /// Display-ordered messages.
    pub messages: Vec<ChatMessage>,
    /// Known members, sorted by id.
    pub members: Vec<Member>,
    /// Transient status text. `None` if no message.
    pub status_message: Option<String>,
}

/// Room session state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable without a network.
#[derive(Clone)]
pub struct RoomSession<E: Environment> {
    /// Environment for time and local id generation.
    env: E,
    /// Configuration.
    config: SessionConfig,
    /// Our user id (own hub echoes reconcile against optimistic entries).
    user_id: UserId,
    /// Our display name for optimistic entries.
    user_name: String,
    /// Lifecycle phase.
    phase: SessionPhase,
    /// Open room. `None` only in `Idle`.
    room_id: Option<RoomId>,
    /// Room metadata from the last history fetch.
    room_info: Option<RoomInfo>,
    /// Ordered message state for the open room.
    store: MessageStore,
    /// Known members of the open room.
    members: HashMap<UserId, Member>,
    /// Sends held until `Active` (arrival order).
    queued: VecDeque<QueuedSend>,
    /// Sends handed to the hub, awaiting echoes.
    in_flight: Vec<InFlightSend<E::Instant>>,
    /// Current history fetch generation; stale results are discarded.
    fetch_generation: u64,
    /// Translation target language, if any.
    language: Option<String>,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
}

impl<E: Environment> RoomSession<E> {
    /// Create an idle session for the given user.
    pub fn new(env: E, user_id: UserId, user_name: impl Into<String>) -> Self {
        Self::with_config(env, user_id, user_name, SessionConfig::default())
    }

    /// Create an idle session with explicit configuration.
    pub fn with_config(
        env: E,
        user_id: UserId,
        user_name: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            env,
            config,
            user_id,
            user_name: user_name.into(),
            phase: SessionPhase::Idle,
            room_id: None,
            room_info: None,
            store: MessageStore::new(),
            members: HashMap::new(),
            queued: VecDeque::new(),
            in_flight: Vec::new(),
            fetch_generation: 0,
            language: None,
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SessionEvent<E::Instant>) -> Vec<SessionAction> {
        match event {
            SessionEvent::Open { room_id } => self.handle_open(room_id),
            SessionEvent::Joined => self.handle_joined(),
            SessionEvent::JoinFailed { error } => {
                self.handle_setup_failure(format!("Could not join room: {error}"))
            },
            SessionEvent::ConnectFailed { error } => {
                self.handle_setup_failure(format!("Could not connect: {error}"))
            },
            SessionEvent::HistoryFetched { generation, result } => {
                self.handle_history(generation, result)
            },
            SessionEvent::Hub(event) => self.handle_hub_event(event),
            SessionEvent::SendRequested { body } => self.handle_send(body),
            SessionEvent::RetrySend { local_id } => self.handle_retry(local_id),
            SessionEvent::SendFailed { local_id, error } => {
                self.handle_send_failed(local_id, &error.to_string())
            },
            SessionEvent::RefreshHistory => self.handle_refresh_history(),
            SessionEvent::LanguageChanged { language } => {
                self.language = Some(language.clone());
                vec![SessionAction::TranslateEager { language }, SessionAction::Render]
            },
            SessionEvent::RoomUpdated { info } => {
                if self.room_id == Some(info.id) {
                    self.room_info = Some(info);
                    vec![SessionAction::Render]
                } else {
                    vec![]
                }
            },
            SessionEvent::Notice { message } => {
                self.status_message = Some(message);
                vec![SessionAction::Render]
            },
            SessionEvent::Tick { now } => self.handle_tick(now),
            SessionEvent::Close => self.handle_close(),
            SessionEvent::LeaveCompleted => self.handle_leave_completed(),
        }
    }

    fn handle_open(&mut self, room_id: RoomId) -> Vec<SessionAction> {
        if self.phase != SessionPhase::Idle {
            tracing::debug!(room_id, phase = ?self.phase, "open rejected, session busy");
            self.status_message =
                Some("Close the current room before opening another".to_string());
            return vec![SessionAction::Render];
        }

        self.phase = SessionPhase::Joining;
        self.room_id = Some(room_id);
        self.status_message = None;
        vec![SessionAction::Connect, SessionAction::Join { room_id }, SessionAction::Render]
    }

    fn handle_joined(&mut self) -> Vec<SessionAction> {
        let Some(room_id) = self.room_id else {
            return vec![];
        };
        match self.phase {
            SessionPhase::Joining | SessionPhase::Reconnecting => {
                self.phase = SessionPhase::Active;
                self.status_message = None;

                let mut actions =
                    vec![SessionAction::FetchHistory { room_id, generation: self.fetch_generation }];
                self.flush_queued(room_id, &mut actions);
                actions.push(SessionAction::Render);
                actions
            },
            _ => {
                tracing::debug!(phase = ?self.phase, "ignoring join confirmation");
                vec![]
            },
        }
    }

    /// Flush queued sends to the hub in arrival order.
    fn flush_queued(&mut self, room_id: RoomId, actions: &mut Vec<SessionAction>) {
        let now = self.env.now();
        while let Some(send) = self.queued.pop_front() {
            actions.push(SessionAction::SendToHub {
                room_id,
                local_id: send.local_id,
                body: send.body.clone(),
            });
            self.in_flight.push(InFlightSend {
                local_id: send.local_id,
                body: send.body,
                issued_at: now,
                failed: false,
            });
        }
    }

    fn handle_setup_failure(&mut self, message: String) -> Vec<SessionAction> {
        match self.phase {
            SessionPhase::Joining => {
                // Joining never succeeded; tear the view state down.
                self.reset_room_state();
                self.phase = SessionPhase::Idle;
                self.room_id = None;
                self.status_message = Some(message);
                vec![SessionAction::ClearTranslations, SessionAction::Render]
            },
            SessionPhase::Reconnecting => {
                // Stay put; the next Reconnected event retries the join.
                self.status_message = Some(message);
                vec![SessionAction::Render]
            },
            _ => {
                tracing::debug!(phase = ?self.phase, %message, "ignoring setup failure");
                vec![]
            },
        }
    }

    fn handle_history(
        &mut self,
        generation: u64,
        result: Result<palaver_client::rest::RoomDetail, palaver_client::HistoryFetchError>,
    ) -> Vec<SessionAction> {
        if generation != self.fetch_generation {
            tracing::debug!(generation, current = self.fetch_generation, "stale history discarded");
            return vec![];
        }
        if !matches!(self.phase, SessionPhase::Active | SessionPhase::Reconnecting) {
            return vec![];
        }

        match result {
            Ok(detail) => {
                self.room_info = Some(detail.info());
                self.members =
                    detail.members.iter().cloned().map(|member| (member.id, member)).collect();
                self.store.seed_history(detail.into_history());
                vec![SessionAction::Render]
            },
            Err(error) => {
                self.status_message = Some(format!("Could not load history: {error}"));
                vec![SessionAction::Render]
            },
        }
    }

    fn handle_refresh_history(&mut self) -> Vec<SessionAction> {
        match (self.phase, self.room_id) {
            (SessionPhase::Active | SessionPhase::Reconnecting, Some(room_id)) => {
                vec![SessionAction::FetchHistory { room_id, generation: self.fetch_generation }]
            },
            _ => vec![],
        }
    }

    fn handle_hub_event(&mut self, event: HubEvent) -> Vec<SessionAction> {
        match event {
            HubEvent::MessageReceived(message) => {
                if self.room_id != Some(message.room_id) || self.phase == SessionPhase::Idle {
                    tracing::debug!(room_id = message.room_id, "message for inactive room dropped");
                    return vec![];
                }
                if message.sender_id == self.user_id {
                    self.reconcile_own_echo(message);
                } else {
                    self.store.append(message);
                }
                vec![SessionAction::Render]
            },
            HubEvent::UserJoined { room_id, member } => {
                if self.room_id != Some(room_id) {
                    return vec![];
                }
                self.members.insert(member.id, member);
                vec![SessionAction::Render]
            },
            HubEvent::UserLeft { room_id, username } => {
                if self.room_id != Some(room_id) {
                    return vec![];
                }
                self.members.retain(|_, member| member.display_name != username);
                vec![SessionAction::Render]
            },
            HubEvent::ConnectionLost { reason } => match self.phase {
                SessionPhase::Active | SessionPhase::Joining => {
                    tracing::debug!(%reason, "connection lost, holding queued sends");
                    self.phase = SessionPhase::Reconnecting;
                    self.status_message = Some("Connection lost, reconnecting".to_string());
                    vec![SessionAction::Render]
                },
                _ => vec![],
            },
            HubEvent::Reconnected => match (self.phase, self.room_id) {
                (SessionPhase::Reconnecting, Some(room_id)) => {
                    // Membership is not preserved across reconnects; join
                    // again and stay Reconnecting until confirmed.
                    vec![SessionAction::Join { room_id }, SessionAction::Render]
                },
                _ => vec![],
            },
        }
    }

    /// Reconcile a hub echo of one of our own sends.
    ///
    /// Matches the oldest outstanding optimistic entry with a byte-equal
    /// body; a send with no outstanding entry (echo of a previous session,
    /// replay) appends de-duplicated by id.
    fn reconcile_own_echo(&mut self, message: ChatMessage) {
        let mut confirmed = message;
        confirmed.status = DeliveryStatus::Confirmed;

        if let Some(idx) = self.in_flight.iter().position(|send| send.body == confirmed.body) {
            let send = self.in_flight.remove(idx);
            self.store.reconcile(send.local_id, confirmed);
        } else if let Some(idx) = self.queued.iter().position(|send| send.body == confirmed.body) {
            // A retried entry's original delivery arrived after all; drop
            // the queued copy so it is not sent twice.
            if let Some(send) = self.queued.remove(idx) {
                self.store.reconcile(send.local_id, confirmed);
            }
        } else {
            self.store.append(confirmed);
        }
    }

    fn handle_send(&mut self, body: String) -> Vec<SessionAction> {
        let Some(room_id) = self.room_id else {
            tracing::debug!("send rejected, no room open");
            self.status_message = Some("No room open".to_string());
            return vec![SessionAction::Render];
        };
        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Leaving) {
            self.status_message = Some("No room open".to_string());
            return vec![SessionAction::Render];
        }

        let local_id = self.env.random_u64();
        let message = ChatMessage::optimistic(
            local_id,
            room_id,
            self.user_id,
            self.user_name.clone(),
            body.clone(),
            self.env.unix_millis(),
        );
        self.store.append_optimistic(message);

        match self.phase {
            SessionPhase::Active => {
                self.in_flight.push(InFlightSend {
                    local_id,
                    body: body.clone(),
                    issued_at: self.env.now(),
                    failed: false,
                });
                vec![
                    SessionAction::SendToHub { room_id, local_id, body },
                    SessionAction::Render,
                ]
            },
            // Held until Active, flushed in arrival order.
            _ => {
                self.queued.push_back(QueuedSend { local_id, body });
                vec![SessionAction::Render]
            },
        }
    }

    fn handle_retry(&mut self, local_id: u64) -> Vec<SessionAction> {
        let Some(room_id) = self.room_id else {
            return vec![];
        };
        let Some(idx) =
            self.in_flight.iter().position(|send| send.local_id == local_id && send.failed)
        else {
            tracing::debug!(local_id, "retry rejected, no failed entry");
            return vec![];
        };

        // Back to Pending in the store.
        if let Some(message) = self.store.get(palaver_core::MessageId::Local(local_id)) {
            let mut message = message.clone();
            message.status = DeliveryStatus::Pending;
            self.store.append(message);
        }

        match self.phase {
            SessionPhase::Active => {
                let send = &mut self.in_flight[idx];
                send.failed = false;
                send.issued_at = self.env.now();
                let body = send.body.clone();
                vec![
                    SessionAction::SendToHub { room_id, local_id, body },
                    SessionAction::Render,
                ]
            },
            _ => {
                let send = self.in_flight.remove(idx);
                self.queued.push_back(QueuedSend { local_id: send.local_id, body: send.body });
                vec![SessionAction::Render]
            },
        }
    }

    fn handle_send_failed(&mut self, local_id: u64, detail: &str) -> Vec<SessionAction> {
        if let Some(send) =
            self.in_flight.iter_mut().find(|send| send.local_id == local_id && !send.failed)
        {
            send.failed = true;
            self.store.mark_failed(local_id);
            self.status_message = Some(format!("Message not delivered: {detail}"));
            vec![SessionAction::Render]
        } else {
            vec![]
        }
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let timeout = self.config.send_timeout;
        let mut changed = false;
        for send in &mut self.in_flight {
            if !send.failed && now - send.issued_at >= timeout {
                send.failed = true;
                self.store.mark_failed(send.local_id);
                tracing::debug!(local_id = send.local_id, "send unacknowledged, marked failed");
                changed = true;
            }
        }
        if changed { vec![SessionAction::Render] } else { vec![] }
    }

    fn handle_close(&mut self) -> Vec<SessionAction> {
        let Some(room_id) = self.room_id else {
            return vec![];
        };
        if matches!(self.phase, SessionPhase::Leaving | SessionPhase::Idle) {
            return vec![];
        }

        if !self.queued.is_empty() {
            tracing::debug!(count = self.queued.len(), "discarding queued sends on close");
        }
        // Invalidate any in-flight history fetch.
        self.fetch_generation += 1;
        self.reset_room_state();
        self.phase = SessionPhase::Leaving;

        vec![
            SessionAction::Leave { room_id },
            SessionAction::ClearTranslations,
            SessionAction::Render,
        ]
    }

    fn handle_leave_completed(&mut self) -> Vec<SessionAction> {
        if self.phase != SessionPhase::Leaving {
            return vec![];
        }
        self.phase = SessionPhase::Idle;
        self.room_id = None;
        vec![SessionAction::Render]
    }

    fn reset_room_state(&mut self) {
        self.store.clear();
        self.members.clear();
        self.queued.clear();
        self.in_flight.clear();
        self.room_info = None;
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Open room. `None` when idle.
    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    /// Room metadata from the last history fetch.
    pub fn room_info(&self) -> Option<&RoomInfo> {
        self.room_info.as_ref()
    }

    /// Known members of the open room.
    pub fn members(&self) -> &HashMap<UserId, Member> {
        &self.members
    }

    /// Display-ordered copy of the messages, most recent first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.store.snapshot()
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Translation target language, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Renderable view of the session.
    pub fn view(&self) -> SessionView {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by_key(|member| member.id);
        SessionView {
            phase: self.phase,
            room: self.room_info.clone(),
            messages: self.store.snapshot(),
            members,
            status_message: self.status_message.clone(),
        }
    }
}
