//! REST collaborator.
//!
//! The backend REST API serves room metadata, message history, and the
//! announcement and room-settings screens. [`RoomsApi`] is the boundary
//! the session layer programs against; [`HttpRoomsApi`] (behind the
//! `rest` feature) is the production HTTP implementation.
//!
//! Endpoints:
//!
//! - `GET /room/{id}` — metadata + historical messages + members
//! - `POST /announcement` — create an announcement
//! - `PUT /room/{id}` — update room name/description

use async_trait::async_trait;
use palaver_core::{
    Announcement, ChatMessage, DeliveryStatus, Member, MessageId, RoomId, RoomInfo, UserId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors fetching room history.
///
/// Surfaced as an inline retry affordance in the room view; a failed
/// history fetch never blocks message sending.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryFetchError {
    /// The room does not exist (or is not visible to this user).
    #[error("room {room_id} not found")]
    NotFound {
        /// The requested room.
        room_id: RoomId,
    },

    /// The request could not be completed.
    #[error("history request failed: {reason}")]
    Request {
        /// Underlying failure detail.
        reason: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed history response: {reason}")]
    Malformed {
        /// Decoding failure detail.
        reason: String,
    },
}

/// Errors from announcement and room-update calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request could not be completed.
    #[error("request failed: {reason}")]
    Request {
        /// Underlying failure detail.
        reason: String,
    },

    /// The backend rejected the request.
    #[error("rejected with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The response body did not match the expected shape.
    #[error("malformed response: {reason}")]
    Malformed {
        /// Decoding failure detail.
        reason: String,
    },
}

/// Wire record for one historical message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned message id.
    pub id: u64,
    /// Sender's user id.
    pub sender_id: UserId,
    /// Sender's display name.
    pub sender_name: String,
    /// Message body.
    pub content: String,
    /// Creation time, unix milliseconds.
    pub sent_at_ms: u64,
}

impl MessageRecord {
    /// Convert into the domain message model for `room_id`.
    #[must_use]
    pub fn into_message(self, room_id: RoomId) -> ChatMessage {
        ChatMessage {
            id: MessageId::Server(self.id),
            room_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            body: self.content,
            original_body: None,
            sent_at_ms: self.sent_at_ms,
            status: DeliveryStatus::Confirmed,
        }
    }
}

/// Response of `GET /room/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetail {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Historical messages, unordered on the wire.
    pub messages: Vec<MessageRecord>,
    /// Current members.
    pub members: Vec<Member>,
}

impl RoomDetail {
    /// Room metadata view.
    #[must_use]
    pub fn info(&self) -> RoomInfo {
        RoomInfo { id: self.id, name: self.name.clone(), description: self.description.clone() }
    }

    /// Historical messages sorted ascending by timestamp, ready to seed a
    /// message store.
    #[must_use]
    pub fn into_history(self) -> Vec<ChatMessage> {
        let room_id = self.id;
        let mut history: Vec<ChatMessage> =
            self.messages.into_iter().map(|record| record.into_message(room_id)).collect();
        history.sort_by_key(|message| message.sent_at_ms);
        history
    }
}

/// Request body of `POST /announcement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnouncement {
    /// Posting user.
    pub sender_id: UserId,
    /// Room the announcement targets.
    pub room_id: RoomId,
    /// Title line.
    pub title: String,
    /// Body content.
    pub content: String,
    /// Marked important by the poster.
    pub important: bool,
}

/// Request body of `PUT /room/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Backend REST API boundary.
#[async_trait]
pub trait RoomsApi: Send + Sync + 'static {
    /// Fetch room metadata, history, and members.
    async fn fetch_room(&self, room_id: RoomId) -> Result<RoomDetail, HistoryFetchError>;

    /// Create an announcement.
    async fn create_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, ApiError>;

    /// Update room name/description.
    async fn update_room(&self, room_id: RoomId, patch: &RoomPatch)
    -> Result<RoomInfo, ApiError>;
}

#[cfg(feature = "rest")]
pub use http::HttpRoomsApi;

#[cfg(feature = "rest")]
mod http {
    use std::sync::Arc;

    use super::{
        Announcement, ApiError, HistoryFetchError, NewAnnouncement, RoomDetail, RoomId, RoomInfo,
        RoomPatch, RoomsApi, async_trait,
    };
    use crate::storage::{SecureStore, keys};

    /// HTTP implementation of [`RoomsApi`].
    ///
    /// Authenticates with the bearer token from secure storage, read per
    /// request so a refreshed token is picked up without reconstruction.
    pub struct HttpRoomsApi<S> {
        base_url: String,
        client: reqwest::Client,
        store: Arc<S>,
    }

    impl<S: SecureStore> HttpRoomsApi<S> {
        /// Create a client for the API rooted at `base_url` (no trailing
        /// slash).
        pub fn new(base_url: impl Into<String>, store: Arc<S>) -> Self {
            Self { base_url: base_url.into(), client: reqwest::Client::new(), store }
        }

        async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
            match self.store.get(keys::SESSION_TOKEN).await {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        }
    }

    #[async_trait]
    impl<S: SecureStore> RoomsApi for HttpRoomsApi<S> {
        async fn fetch_room(&self, room_id: RoomId) -> Result<RoomDetail, HistoryFetchError> {
            let url = format!("{}/room/{room_id}", self.base_url);
            let request = self.authorize(self.client.get(url)).await;

            let response = request
                .send()
                .await
                .map_err(|e| HistoryFetchError::Request { reason: e.to_string() })?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(HistoryFetchError::NotFound { room_id });
            }
            let response = response
                .error_for_status()
                .map_err(|e| HistoryFetchError::Request { reason: e.to_string() })?;

            response
                .json()
                .await
                .map_err(|e| HistoryFetchError::Malformed { reason: e.to_string() })
        }

        async fn create_announcement(
            &self,
            announcement: &NewAnnouncement,
        ) -> Result<Announcement, ApiError> {
            let url = format!("{}/announcement", self.base_url);
            let request = self.authorize(self.client.post(url)).await;

            let response = request
                .json(announcement)
                .send()
                .await
                .map_err(|e| ApiError::Request { reason: e.to_string() })?;

            if !response.status().is_success() {
                return Err(ApiError::Rejected { status: response.status().as_u16() });
            }

            response.json().await.map_err(|e| ApiError::Malformed { reason: e.to_string() })
        }

        async fn update_room(
            &self,
            room_id: RoomId,
            patch: &RoomPatch,
        ) -> Result<RoomInfo, ApiError> {
            let url = format!("{}/room/{room_id}", self.base_url);
            let request = self.authorize(self.client.put(url)).await;

            let response = request
                .json(patch)
                .send()
                .await
                .map_err(|e| ApiError::Request { reason: e.to_string() })?;

            if !response.status().is_success() {
                return Err(ApiError::Rejected { status: response.status().as_u16() });
            }

            response.json().await.map_err(|e| ApiError::Malformed { reason: e.to_string() })
        }
    }
}
