//! Generic runtime for session orchestration.
//!
//! The [`Runtime`] drives the room session event loop, coordinating
//! between:
//! - [`RoomSession`]: pure session state machine
//! - [`ConnectionHandle`]: shared hub connection
//! - [`RoomsApi`]: REST collaborator (history, announcements, settings)
//! - [`TranslationOverlay`]: translation cache
//!
//! The runtime executes the session's actions and feeds their outcomes
//! back in as events. History fetches run as spawned tasks posting
//! [`SessionEvent::HistoryFetched`] to an internal feedback channel; the
//! session's generation token, not task cancellation, discards results
//! that resolve after the room closed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use palaver_client::rest::{NewAnnouncement, RoomPatch, RoomsApi};
use palaver_client::{
    ConnectionHandle, HubEvent, HubTransport, SecureStore, Translator, keys,
};
use palaver_core::{Environment, RoomId};

use tokio::sync::{mpsc, watch};

use crate::session::{RoomSession, SessionView};
use crate::translation::TranslationOverlay;
use crate::{SessionAction, SessionEvent};

/// Cadence of timeout-processing ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the command and feedback channels.
const CHANNEL_BUFFER: usize = 64;

/// User intents accepted by the runtime.
#[derive(Debug, Clone)]
pub enum Command {
    /// Open a room view.
    OpenRoom {
        /// Room to open.
        room_id: RoomId,
    },

    /// Send a message to the open room.
    SendMessage {
        /// Message body.
        body: String,
    },

    /// Retry a failed message.
    RetrySend {
        /// Local id of the failed entry.
        local_id: u64,
    },

    /// Re-fetch room history (inline retry affordance).
    RefreshHistory,

    /// Switch the translation target language; persisted as a preference.
    SetLanguage {
        /// Target language code.
        language: String,
    },

    /// Close the open room view.
    CloseRoom,

    /// Post an announcement (announcements screen).
    PostAnnouncement {
        /// Announcement to create.
        announcement: NewAnnouncement,
    },

    /// Update room name/description (settings screen).
    UpdateRoom {
        /// Room to update.
        room_id: RoomId,
        /// Fields to change.
        patch: RoomPatch,
    },

    /// Stop the runtime loop.
    Shutdown,
}

/// Caller-side handle to a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
}

impl RuntimeHandle {
    /// Submit a command. Returns `false` when the runtime has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Current session view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Subscribe to view updates.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Runtime orchestrating the session against the client collaborators.
pub struct Runtime<H, S, R, T, E>
where
    H: HubTransport,
    S: SecureStore,
    R: RoomsApi,
    T: Translator,
    E: Environment,
{
    handle: ConnectionHandle<H, S>,
    store: Arc<S>,
    api: Arc<R>,
    overlay: Arc<TranslationOverlay<T>>,
    session: RoomSession<E>,
    env: E,
    commands: mpsc::Receiver<Command>,
    hub_events: mpsc::Receiver<HubEvent>,
    feedback_tx: mpsc::Sender<SessionEvent<E::Instant>>,
    feedback_rx: mpsc::Receiver<SessionEvent<E::Instant>>,
    view_tx: watch::Sender<SessionView>,
}

impl<H, S, R, T, E> Runtime<H, S, R, T, E>
where
    H: HubTransport,
    S: SecureStore,
    R: RoomsApi,
    T: Translator,
    E: Environment,
{
    /// Create a runtime over an idle session and its caller-side handle.
    ///
    /// Subscribes to the connection handle immediately so no hub event is
    /// missed between construction and [`run`](Self::run).
    pub fn new(
        handle: ConnectionHandle<H, S>,
        store: Arc<S>,
        api: Arc<R>,
        translator: Arc<T>,
        env: E,
        session: RoomSession<E>,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (feedback_tx, feedback_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (view_tx, view_rx) = watch::channel(session.view());
        let hub_events = handle.subscribe();

        let runtime = Self {
            handle,
            store,
            api,
            overlay: Arc::new(TranslationOverlay::new(translator)),
            session,
            env,
            commands: command_rx,
            hub_events,
            feedback_tx,
            feedback_rx,
            view_tx,
        };
        (runtime, RuntimeHandle { commands: command_tx, view: view_rx })
    }

    /// Translation overlay, for lazy per-message translation on display.
    pub fn overlay(&self) -> Arc<TranslationOverlay<T>> {
        Arc::clone(&self.overlay)
    }

    /// Run the event loop until [`Command::Shutdown`] or all command
    /// senders are dropped.
    pub async fn run(mut self) {
        // Restore the persisted language preference.
        if let Some(language) = self.store.get(keys::LANGUAGE).await {
            self.dispatch(SessionEvent::LanguageChanged { language }).await;
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        },
                        None => break,
                    }
                },
                Some(event) = self.hub_events.recv() => {
                    self.dispatch(SessionEvent::Hub(event)).await;
                },
                Some(event) = self.feedback_rx.recv() => {
                    self.dispatch(event).await;
                },
                () = self.env.sleep(TICK_INTERVAL) => {
                    let now = self.env.now();
                    self.dispatch(SessionEvent::Tick { now }).await;
                },
            }
        }
        tracing::debug!("runtime stopped");
    }

    /// Process one command. Returns `true` to stop the loop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::OpenRoom { room_id } => {
                self.dispatch(SessionEvent::Open { room_id }).await;
            },
            Command::SendMessage { body } => {
                self.dispatch(SessionEvent::SendRequested { body }).await;
            },
            Command::RetrySend { local_id } => {
                self.dispatch(SessionEvent::RetrySend { local_id }).await;
            },
            Command::RefreshHistory => {
                self.dispatch(SessionEvent::RefreshHistory).await;
            },
            Command::SetLanguage { language } => {
                self.store.set(keys::LANGUAGE, &language).await;
                self.dispatch(SessionEvent::LanguageChanged { language }).await;
            },
            Command::CloseRoom => {
                self.dispatch(SessionEvent::Close).await;
            },
            Command::PostAnnouncement { announcement } => {
                let event = match self.api.create_announcement(&announcement).await {
                    Ok(created) => {
                        tracing::debug!(id = created.id, "announcement posted");
                        SessionEvent::Notice { message: "Announcement posted".to_string() }
                    },
                    Err(error) => SessionEvent::Notice {
                        message: format!("Could not post announcement: {error}"),
                    },
                };
                self.dispatch(event).await;
            },
            Command::UpdateRoom { room_id, patch } => {
                let event = match self.api.update_room(room_id, &patch).await {
                    Ok(info) => SessionEvent::RoomUpdated { info },
                    Err(error) => SessionEvent::Notice {
                        message: format!("Could not update room: {error}"),
                    },
                };
                self.dispatch(event).await;
            },
            Command::Shutdown => return true,
        }
        false
    }

    /// Feed an event through the session and execute the resulting
    /// actions, draining any follow-up events they produce.
    async fn dispatch(&mut self, event: SessionEvent<E::Instant>) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let actions = self.session.handle(event);
            for action in actions {
                self.execute(action, &mut pending).await;
            }
        }
    }

    async fn execute(
        &mut self,
        action: SessionAction,
        pending: &mut VecDeque<SessionEvent<E::Instant>>,
    ) {
        match action {
            SessionAction::Connect => {
                if let Err(error) = self.handle.connect().await {
                    pending.push_back(SessionEvent::ConnectFailed { error });
                }
            },
            SessionAction::Join { room_id } => match self.handle.join_room(room_id).await {
                Ok(()) => pending.push_back(SessionEvent::Joined),
                Err(error) => pending.push_back(SessionEvent::JoinFailed { error }),
            },
            SessionAction::Leave { room_id } => {
                self.handle.leave_room(room_id).await;
                pending.push_back(SessionEvent::LeaveCompleted);
            },
            SessionAction::SendToHub { room_id, local_id, body } => {
                if let Err(error) = self.handle.send(room_id, &body).await {
                    pending.push_back(SessionEvent::SendFailed { local_id, error });
                }
            },
            SessionAction::FetchHistory { room_id, generation } => {
                let api = Arc::clone(&self.api);
                let feedback = self.feedback_tx.clone();
                tokio::spawn(async move {
                    let result = api.fetch_room(room_id).await;
                    let _ = feedback
                        .send(SessionEvent::HistoryFetched { generation, result })
                        .await;
                });
            },
            SessionAction::TranslateEager { language } => {
                let overlay = Arc::clone(&self.overlay);
                let snapshot = self.session.snapshot();
                let window = self.session.config().eager_translate_window;
                tokio::spawn(async move {
                    overlay.eager_translate(&snapshot, &language, window).await;
                });
            },
            SessionAction::ClearTranslations => self.overlay.clear(),
            SessionAction::Render => {
                let _ = self.view_tx.send(self.session.view());
            },
        }
    }
}
