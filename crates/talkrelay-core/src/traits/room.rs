// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room transport trait: the real-time chat-room side of the relay.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationId, EventId, InboundEvent, RoomContent};

/// Adapter for the chat-room event source.
///
/// The relay consumes this interface only; subscription mechanics,
/// encryption and media storage live behind it.
#[async_trait]
pub trait RoomTransport: PluginAdapter {
    /// The relay's own identity in the room transport.
    fn own_user_id(&self) -> &str;

    /// Starts the event subscription. Idempotent.
    async fn connect(&mut self) -> Result<(), RelayError>;

    /// Waits for the next message event from any room.
    async fn next_event(&self) -> Result<InboundEvent, RelayError>;

    /// Moves the read marker of `conversation` to `event_id`.
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<(), RelayError>;

    /// Posts `content` into `conversation`, returning the new event id.
    async fn send_content(
        &self,
        conversation: &ConversationId,
        content: &RoomContent,
    ) -> Result<EventId, RelayError>;

    /// Fetches the bytes behind a room-side media reference.
    async fn download_media(&self, uri: &str) -> Result<Vec<u8>, RelayError>;

    /// Uploads bytes, returning their room-side media reference.
    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, RelayError>;

    /// Retracts `event_id`, returning the id of the redaction event.
    async fn redact(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<EventId, RelayError>;

    /// Fetches the content of a single event.
    async fn get_event(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<serde_json::Value, RelayError>;
}
