// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock remote backend for deterministic testing.
//!
//! `MockRemote` implements `RemoteBackend`. Deliveries succeed unless a
//! failure was scripted; fetches return queued batches in order.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use talkrelay_core::{
    AdapterType, ConversationId, DeliveryRecord, HealthStatus, OutboundWireMessage, PluginAdapter,
    RelayError, RemoteBackend, RemoteMessage,
};

/// A scripted answer of the mock backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Ok,
    /// Non-200 answer: 4xx maps to a client error, anything else to a protocol error.
    Status(u16),
    /// The backend is unreachable.
    TransportDown,
}

impl Scripted {
    fn into_result(self, endpoint: &str) -> Result<(), RelayError> {
        match self {
            Self::Ok => Ok(()),
            Self::Status(status) if (400..500).contains(&status) => {
                Err(RelayError::ClientRequest {
                    endpoint: endpoint.to_string(),
                    status,
                    description: "scripted rejection".into(),
                })
            }
            Self::Status(status) => Err(RelayError::Protocol {
                endpoint: endpoint.to_string(),
                status,
                description: "scripted failure".into(),
            }),
            Self::TransportDown => Err(RelayError::Transport {
                message: "connection refused".into(),
                source: None,
            }),
        }
    }
}

type Tag = (ConversationId, String, String);

/// A mock remote backend for testing.
pub struct MockRemote {
    tagging: bool,
    receive_script: Arc<Mutex<VecDeque<Scripted>>>,
    receive_attempts: Arc<Mutex<usize>>,
    received: Arc<Mutex<Vec<OutboundWireMessage>>>,
    batches: Arc<Mutex<VecDeque<Result<Vec<RemoteMessage>, Scripted>>>>,
    fetches: Arc<Mutex<usize>>,
    confirmations: Arc<Mutex<Vec<Vec<DeliveryRecord>>>>,
    tags: Arc<Mutex<Vec<Tag>>>,
}

impl MockRemote {
    /// Create a backend without a tagging endpoint.
    pub fn new() -> Self {
        Self {
            tagging: false,
            receive_script: Arc::new(Mutex::new(VecDeque::new())),
            receive_attempts: Arc::new(Mutex::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            batches: Arc::new(Mutex::new(VecDeque::new())),
            fetches: Arc::new(Mutex::new(0)),
            confirmations: Arc::new(Mutex::new(Vec::new())),
            tags: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a backend that exposes `tagRoom`.
    pub fn with_tagging() -> Self {
        Self {
            tagging: true,
            ..Self::new()
        }
    }

    /// Answers for the next `receive_message()` calls. Once used up, calls succeed.
    pub async fn script_receive(&self, answers: impl IntoIterator<Item = Scripted>) {
        self.receive_script.lock().await.extend(answers);
    }

    /// Messages returned by the next `get_messages()` call.
    pub async fn queue_batch(&self, messages: Vec<RemoteMessage>) {
        self.batches.lock().await.push_back(Ok(messages));
    }

    /// The next `get_messages()` call fails with `answer`.
    pub async fn fail_next_fetch(&self, answer: Scripted) {
        self.batches.lock().await.push_back(Err(answer));
    }

    /// Calls to `receive_message()`, including failed ones.
    pub async fn receive_attempts(&self) -> usize {
        *self.receive_attempts.lock().await
    }

    /// Successfully delivered messages, in order.
    pub async fn received(&self) -> Vec<OutboundWireMessage> {
        self.received.lock().await.clone()
    }

    pub async fn received_in(&self, conversation: &str) -> Vec<OutboundWireMessage> {
        self.received
            .lock()
            .await
            .iter()
            .filter(|m| m.conversation_id.as_str() == conversation)
            .cloned()
            .collect()
    }

    pub async fn fetch_count(&self) -> usize {
        *self.fetches.lock().await
    }

    /// One entry per `confirm_messages()` call.
    pub async fn confirmations(&self) -> Vec<Vec<DeliveryRecord>> {
        self.confirmations.lock().await.clone()
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.tags.lock().await.clone()
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockRemote {
    fn name(&self) -> &str {
        "mock-remote"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Remote
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MockRemote {
    async fn receive_message(&self, msg: &OutboundWireMessage) -> Result<(), RelayError> {
        *self.receive_attempts.lock().await += 1;
        let answer = self
            .receive_script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Scripted::Ok);
        answer.into_result("/receiveMessage")?;
        self.received.lock().await.push(msg.clone());
        Ok(())
    }

    async fn get_messages(&self) -> Result<Vec<RemoteMessage>, RelayError> {
        *self.fetches.lock().await += 1;
        match self.batches.lock().await.pop_front() {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(answer)) => answer.into_result("/getMessages").map(|()| Vec::new()),
            None => Ok(Vec::new()),
        }
    }

    async fn confirm_messages(&self, records: &[DeliveryRecord]) -> Result<(), RelayError> {
        self.confirmations.lock().await.push(records.to_vec());
        Ok(())
    }

    fn supports_tagging(&self) -> bool {
        self.tagging
    }

    async fn tag_room(
        &self,
        conversation: &ConversationId,
        tag: &str,
        value: &str,
    ) -> Result<(), RelayError> {
        if !self.tagging {
            return Err(RelayError::Config("tagRoom endpoint not configured".into()));
        }
        self.tags
            .lock()
            .await
            .push((conversation.clone(), tag.to_string(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote;

    #[tokio::test]
    async fn scripted_failures_map_to_taxonomy() {
        let backend = MockRemote::new();
        backend
            .script_receive([Scripted::Status(404), Scripted::Status(502), Scripted::TransportDown])
            .await;
        let msg = crate::builders::wire("!r:x", "hi");

        let errors = [
            backend.receive_message(&msg).await.unwrap_err(),
            backend.receive_message(&msg).await.unwrap_err(),
            backend.receive_message(&msg).await.unwrap_err(),
        ];
        assert!(matches!(errors[0], RelayError::ClientRequest { status: 404, .. }));
        assert!(matches!(errors[1], RelayError::Protocol { status: 502, .. }));
        assert!(matches!(errors[2], RelayError::Transport { .. }));

        backend.receive_message(&msg).await.unwrap();
        assert_eq!(backend.receive_attempts().await, 4);
        assert_eq!(backend.received().await.len(), 1);
    }

    #[tokio::test]
    async fn batches_are_served_in_order_then_empty() {
        let backend = MockRemote::new();
        backend.queue_batch(vec![remote::text("1", "!r:x", "a")]).await;
        backend.fail_next_fetch(Scripted::TransportDown).await;

        assert_eq!(backend.get_messages().await.unwrap().len(), 1);
        assert!(backend.get_messages().await.is_err());
        assert!(backend.get_messages().await.unwrap().is_empty());
        assert_eq!(backend.fetch_count().await, 3);
    }
}
