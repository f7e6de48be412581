//! Application layer for Palaver
//!
//! The room session controller as a pure state machine plus the async
//! runtime that executes its actions against the client collaborators.
//! The controller is the sole mutator of its message store; consistency
//! comes from serializing mutations through its event handling, not from
//! locks.
//!
//! # Components
//!
//! - [`RoomSession`]: room lifecycle state machine (join, send, receive,
//!   reconnect, leave)
//! - [`SessionEvent`] / [`SessionAction`]: the machine's inputs and the
//!   instructions it returns
//! - [`TranslationOverlay`]: per-message translation cache with
//!   single-flight de-duplication
//! - [`Runtime`]: orchestration loop wiring the session to the connection
//!   handle, REST API, and translator
//! - [`TokioEnv`]: production [`Environment`](palaver_core::Environment)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod env;
mod event;
mod runtime;
mod session;
mod translation;

pub use action::SessionAction;
pub use env::TokioEnv;
pub use event::SessionEvent;
pub use runtime::{Command, Runtime, RuntimeHandle};
pub use session::{
    DEFAULT_EAGER_TRANSLATE_WINDOW, DEFAULT_SEND_TIMEOUT, RoomSession, SessionConfig,
    SessionPhase, SessionView,
};
pub use translation::TranslationOverlay;
