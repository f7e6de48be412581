//! Connection handle over the shared hub connection.
//!
//! One live hub connection serves the whole authenticated app session.
//! The handle is an explicitly owned, injectable value (cloned into
//! whichever controller needs it, no process-wide singleton) and fans hub
//! events out to any number of independent subscribers, each with its own
//! channel that can be added or dropped without disturbing the others.
//!
//! A pump task forwards transport events to subscribers and keeps the
//! exposed [`HandleStatus`] current from connection lifecycle events.

use std::sync::{Arc, Mutex};

use palaver_core::RoomId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::AbortHandle;

use crate::error::{ConnectionError, RoomJoinError, SendError};
use crate::hub::{HubEvent, HubTransport};
use crate::storage::{SecureStore, keys};

/// Per-subscriber channel capacity.
const SUBSCRIBER_BUFFER: usize = 64;

/// Connection status as observed by this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// No connection, none being attempted.
    Disconnected,
    /// `connect()` is negotiating with the hub.
    Connecting,
    /// Live connection.
    Connected,
    /// Connection dropped; the transport is retrying on its own.
    Reconnecting,
}

struct HandleState {
    status: HandleStatus,
    subscribers: Vec<mpsc::Sender<HubEvent>>,
    pump: Option<AbortHandle>,
}

/// Shared handle over a single real-time hub connection.
///
/// Cheap to clone; clones share the connection, status, and subscriber
/// set. All operations are asynchronous and never block the caller's
/// thread.
pub struct ConnectionHandle<H, S> {
    transport: Arc<H>,
    store: Arc<S>,
    state: Arc<Mutex<HandleState>>,
}

impl<H, S> Clone for ConnectionHandle<H, S> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
        }
    }
}

impl<H: HubTransport, S: SecureStore> ConnectionHandle<H, S> {
    /// Create a handle over the given transport and secure store.
    pub fn new(transport: Arc<H>, store: Arc<S>) -> Self {
        Self {
            transport,
            store,
            state: Arc::new(Mutex::new(HandleState {
                status: HandleStatus::Disconnected,
                subscribers: Vec::new(),
                pump: None,
            })),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> HandleStatus {
        self.lock_state().status
    }

    /// Establish the hub connection. Idempotent.
    ///
    /// Returns immediately when a connection is already live or being
    /// attempted. Otherwise reads the bearer token from secure storage and
    /// starts the transport; automatic retry after a drop is the
    /// transport's job, observed here as status changes.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::MissingToken`] when no session token is stored
    /// - [`ConnectionError::AuthRejected`] / [`ConnectionError::Network`]
    ///   from the transport
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut state = self.lock_state();
            match state.status {
                HandleStatus::Connected
                | HandleStatus::Connecting
                | HandleStatus::Reconnecting => return Ok(()),
                HandleStatus::Disconnected => state.status = HandleStatus::Connecting,
            }
        }

        let Some(token) = self.store.get(keys::SESSION_TOKEN).await else {
            self.lock_state().status = HandleStatus::Disconnected;
            return Err(ConnectionError::MissingToken);
        };

        match self.transport.connect(&token).await {
            Ok(events) => {
                let pump = self.spawn_pump(events);
                let mut state = self.lock_state();
                if let Some(old) = state.pump.replace(pump) {
                    old.abort();
                }
                state.status = HandleStatus::Connected;
                tracing::debug!("hub connection established");
                Ok(())
            },
            Err(e) => {
                self.lock_state().status = HandleStatus::Disconnected;
                Err(e)
            },
        }
    }

    /// Join a room's broadcast group.
    ///
    /// # Errors
    ///
    /// - [`RoomJoinError::NotConnected`] when no live connection; the
    ///   caller must [`connect`](Self::connect) first or retry
    /// - [`RoomJoinError::Rejected`] when the hub refuses
    pub async fn join_room(&self, room_id: RoomId) -> Result<(), RoomJoinError> {
        if self.status() != HandleStatus::Connected {
            return Err(RoomJoinError::NotConnected);
        }
        self.transport.join_room(room_id).await
    }

    /// Leave a room's broadcast group. Best-effort.
    ///
    /// Failures are logged, never returned: closing a room view must not
    /// block on the network.
    pub async fn leave_room(&self, room_id: RoomId) {
        if self.status() != HandleStatus::Connected {
            tracing::debug!(room_id, "leave skipped, not connected");
            return;
        }
        if let Err(e) = self.transport.leave_room(room_id).await {
            tracing::warn!(room_id, error = %e, "leave failed");
        }
    }

    /// Send a message body to a room.
    ///
    /// The caller owns retry and optimistic reconciliation; confirmation
    /// arrives as a [`HubEvent::MessageReceived`] echo.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotConnected`] when no live connection
    /// - [`SendError::Transport`] when the hub delivery fails
    pub async fn send(&self, room_id: RoomId, body: &str) -> Result<(), SendError> {
        if self.status() != HandleStatus::Connected {
            return Err(SendError::NotConnected);
        }
        self.transport.send_message(room_id, body).await
    }

    /// Register a new event subscriber.
    ///
    /// Every subscriber receives every hub event independently. Dropping
    /// the returned receiver unsubscribes; other subscribers are
    /// unaffected.
    pub fn subscribe(&self) -> mpsc::Receiver<HubEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.lock_state().subscribers.push(tx);
        rx
    }

    /// Stop the connection and drop all subscribers.
    pub fn disconnect(&self) {
        let mut state = self.lock_state();
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        state.subscribers.clear();
        state.status = HandleStatus::Disconnected;
    }

    fn spawn_pump(&self, mut events: mpsc::Receiver<HubEvent>) -> AbortHandle {
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let mut guard = match state.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match &event {
                    HubEvent::ConnectionLost { reason } => {
                        tracing::warn!(%reason, "hub connection lost, transport retrying");
                        guard.status = HandleStatus::Reconnecting;
                    },
                    HubEvent::Reconnected => {
                        tracing::debug!("hub connection re-established");
                        guard.status = HandleStatus::Connected;
                    },
                    _ => {},
                }
                guard.subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("subscriber lagging, dropping hub event");
                        true
                    },
                    Err(TrySendError::Closed(_)) => false,
                });
            }
            // Transport gave up: the event channel is gone.
            if let Ok(mut guard) = state.lock() {
                guard.status = HandleStatus::Disconnected;
                guard.pump = None;
            }
        });
        task.abort_handle()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HandleState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
