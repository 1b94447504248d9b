//! REST client for the room directory and history loader.
//!
//! Every request carries the bearer credential in the `Authorization` header.
//! Non-success responses are turned into [`RestError::Status`] with the
//! server's `error` text when the body has one.

use chatsync_proto::{CreateRoomRequest, HistoryPage, Room, RoomEnvelope, RoomId, RoomList};
use serde::Deserialize;

use crate::{Endpoint, RestError};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the chat REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    token: Option<String>,
}

impl RestClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: Endpoint, token: Option<String>) -> Self {
        Self { http: reqwest::Client::new(), endpoint, token }
    }

    /// Rooms the user belongs to.
    ///
    /// # Errors
    ///
    /// Returns `RestError` if the request fails or the server rejects it.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, RestError> {
        let url = self.endpoint.rest_url("chats/")?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let list: RoomList = Self::success(response).await?.json().await?;
        Ok(list.rooms)
    }

    /// Most recent messages of a room, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RestError` if the request fails or the server rejects it.
    pub async fn history(
        &self,
        room_id: RoomId,
        limit: u32,
        offset: u32,
    ) -> Result<HistoryPage, RestError> {
        let mut url = self.endpoint.rest_url(&format!("chats/{room_id}/messages"))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let response = self.authorized(self.http.get(url)).send().await?;
        Ok(Self::success(response).await?.json().await?)
    }

    /// Create a room.
    ///
    /// # Errors
    ///
    /// Returns `RestError` if the request fails or the server rejects it.
    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<Room, RestError> {
        let url = self.endpoint.rest_url("chats/")?;
        let response = self.authorized(self.http.post(url).json(request)).send().await?;
        let envelope: RoomEnvelope = Self::success(response).await?.json().await?;
        Ok(envelope.room)
    }

    /// Join a room.
    ///
    /// # Errors
    ///
    /// Returns `RestError` if the request fails or the server rejects it.
    pub async fn join_room(&self, room_id: RoomId) -> Result<(), RestError> {
        self.post_empty(&format!("chats/{room_id}/join")).await
    }

    /// Leave a room.
    ///
    /// # Errors
    ///
    /// Returns `RestError` if the request fails or the server rejects it.
    pub async fn leave_room(&self, room_id: RoomId) -> Result<(), RestError> {
        self.post_empty(&format!("chats/{room_id}/leave")).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), RestError> {
        let url = self.endpoint.rest_url(path)?;
        let response = self.authorized(self.http.post(url)).send().await?;
        Self::success(response).await?;
        Ok(())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn success(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

        tracing::debug!(status = status.as_u16(), %message, "request rejected");
        Err(RestError::Status { status: status.as_u16(), message })
    }
}
