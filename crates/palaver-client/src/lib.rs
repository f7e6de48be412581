//! Client collaborators
//!
//! The connection handle over the real-time hub, plus the trait boundaries
//! to the chat client's external collaborators: the backend REST API, the
//! local secure key-value store, and the translation service. Protocol and
//! session logic live in `palaver-app`; this crate only moves data across
//! those boundaries.
//!
//! # Components
//!
//! - [`ConnectionHandle`]: shared, injectable handle over one hub connection
//! - [`HubTransport`] / [`HubEvent`]: the real-time hub boundary
//! - [`rest`]: REST collaborator trait and DTOs
//! - [`SecureStore`] / [`MemoryStore`]: opaque key-value storage
//! - [`Translator`]: external text translation
//!
//! # REST transport (optional)
//!
//! With the `rest` feature enabled, [`rest::HttpRoomsApi`] provides a
//! production HTTP implementation of the REST collaborator.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod handle;
mod hub;
pub mod rest;
mod storage;
mod translate;

pub use error::{ConnectionError, LeaveError, RoomJoinError, SendError};
pub use handle::{ConnectionHandle, HandleStatus};
pub use hub::{HubEvent, HubTransport};
pub use rest::{HistoryFetchError, RoomsApi};
pub use storage::{MemoryStore, SecureStore, keys};
pub use translate::{TranslationError, Translator};
