// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock room transport for deterministic testing.
//!
//! `MockRoom` implements `RoomTransport` with injectable inbound events, an
//! in-memory media repository, and captured outbound content, redactions
//! and read markers for assertion in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

use talkrelay_core::{
    AdapterType, ConversationId, EventId, HealthStatus, InboundEvent, PluginAdapter, RelayError,
    RoomContent, RoomTransport,
};

type Redaction = (ConversationId, EventId, Option<String>);

/// A mock chat-room transport for testing.
pub struct MockRoom {
    own_user_id: String,
    inbound: Arc<Mutex<VecDeque<InboundEvent>>>,
    notify: Arc<Notify>,
    sent: Arc<Mutex<Vec<(ConversationId, RoomContent)>>>,
    events: Arc<Mutex<HashMap<EventId, Value>>>,
    media: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    downloads: Arc<Mutex<usize>>,
    uploads: Arc<Mutex<Vec<(String, Vec<u8>, String)>>>,
    redactions: Arc<Mutex<Vec<Redaction>>>,
    read_markers: Arc<Mutex<Vec<(ConversationId, EventId)>>>,
    failing_sends: Arc<Mutex<usize>>,
}

impl MockRoom {
    /// Create a mock room where the relay is `own_user_id`.
    pub fn new(own_user_id: &str) -> Self {
        Self {
            own_user_id: own_user_id.to_string(),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(HashMap::new())),
            media: Arc::new(Mutex::new(HashMap::new())),
            downloads: Arc::new(Mutex::new(0)),
            uploads: Arc::new(Mutex::new(Vec::new())),
            redactions: Arc::new(Mutex::new(Vec::new())),
            read_markers: Arc::new(Mutex::new(Vec::new())),
            failing_sends: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue an event for the next `next_event()` call.
    pub async fn inject_event(&self, event: InboundEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Make `uri` downloadable.
    pub async fn seed_media(&self, uri: &str, bytes: Vec<u8>) {
        self.media.lock().await.insert(uri.to_string(), bytes);
    }

    /// The next `count` calls to `send_content()` fail.
    pub async fn fail_next_sends(&self, count: usize) {
        *self.failing_sends.lock().await = count;
    }

    /// Every piece of content posted, in order.
    pub async fn sent(&self) -> Vec<(ConversationId, RoomContent)> {
        self.sent.lock().await.clone()
    }

    /// Content posted into one conversation, in order.
    pub async fn sent_in(&self, conversation: &str) -> Vec<RoomContent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(c, _)| c.as_str() == conversation)
            .map(|(_, content)| content.clone())
            .collect()
    }

    pub async fn download_count(&self) -> usize {
        *self.downloads.lock().await
    }

    /// `(uri, bytes, mime_type)` of every upload.
    pub async fn uploads(&self) -> Vec<(String, Vec<u8>, String)> {
        self.uploads.lock().await.clone()
    }

    /// `(conversation, redacted event, reason)` of every redaction.
    pub async fn redactions(&self) -> Vec<Redaction> {
        self.redactions.lock().await.clone()
    }

    pub async fn read_markers(&self) -> Vec<(ConversationId, EventId)> {
        self.read_markers.lock().await.clone()
    }

    fn new_event_id() -> EventId {
        EventId(format!("$mock-{}", uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl PluginAdapter for MockRoom {
    fn name(&self) -> &str {
        "mock-room"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Room
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl RoomTransport for MockRoom {
    fn own_user_id(&self) -> &str {
        &self.own_user_id
    }

    async fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<InboundEvent, RelayError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn mark_read(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<(), RelayError> {
        self.read_markers
            .lock()
            .await
            .push((conversation.clone(), event_id.clone()));
        Ok(())
    }

    async fn send_content(
        &self,
        conversation: &ConversationId,
        content: &RoomContent,
    ) -> Result<EventId, RelayError> {
        {
            let mut failing = self.failing_sends.lock().await;
            if *failing > 0 {
                *failing -= 1;
                return Err(RelayError::Room {
                    message: format!("mock send into {conversation} failed"),
                    source: None,
                });
            }
        }
        let event_id = Self::new_event_id();
        self.events.lock().await.insert(
            event_id.clone(),
            json!({ "type": "m.room.message", "content": content.to_event_content() }),
        );
        self.sent
            .lock()
            .await
            .push((conversation.clone(), content.clone()));
        Ok(event_id)
    }

    async fn download_media(&self, uri: &str) -> Result<Vec<u8>, RelayError> {
        *self.downloads.lock().await += 1;
        self.media
            .lock()
            .await
            .get(uri)
            .cloned()
            .ok_or_else(|| RelayError::Room {
                message: format!("no media at {uri}"),
                source: None,
            })
    }

    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, RelayError> {
        let uri = format!("mxc://mock/{}", uuid::Uuid::new_v4().simple());
        self.media.lock().await.insert(uri.clone(), bytes.clone());
        self.uploads
            .lock()
            .await
            .push((uri.clone(), bytes, mime_type.to_string()));
        Ok(uri)
    }

    async fn redact(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<EventId, RelayError> {
        let redaction = Self::new_event_id();
        self.events.lock().await.insert(
            redaction.clone(),
            json!({
                "type": "m.room.redaction",
                "redacts": event_id.as_str(),
                "content": { "reason": reason },
            }),
        );
        self.redactions.lock().await.push((
            conversation.clone(),
            event_id.clone(),
            reason.map(str::to_string),
        ));
        Ok(redaction)
    }

    async fn get_event(
        &self,
        _conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<Value, RelayError> {
        self.events
            .lock()
            .await
            .get(event_id)
            .cloned()
            .ok_or_else(|| RelayError::Room {
                message: format!("unknown event {event_id}"),
                source: None,
            })
    }
}
