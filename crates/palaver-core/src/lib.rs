//! Core domain model for Palaver
//!
//! Shared types for the chat client: message and room identifiers, the
//! ordered per-room [`MessageStore`] with optimistic insertion and
//! reconciliation, and the [`Environment`] abstraction that keeps the
//! session layer deterministic under test.
//!
//! # Components
//!
//! - [`ChatMessage`], [`MessageId`], [`DeliveryStatus`]: the message model
//! - [`MessageStore`]: ordered message list for the active room
//! - [`RoomInfo`], [`Member`], [`Announcement`]: room-level metadata
//! - [`Environment`]: time and randomness abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod env;
mod store;
mod types;

pub use env::Environment;
pub use store::MessageStore;
pub use types::{
    Announcement, ChatMessage, DeliveryStatus, Member, MessageId, RoomId, RoomInfo, UserId,
};
