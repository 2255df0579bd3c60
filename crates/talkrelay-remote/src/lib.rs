// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote backend adapter for the Talkrelay message relay.
//!
//! This crate implements [`RemoteBackend`] over the backend's polling HTTP
//! API: `receiveMessage`, `getMessages`, `confirmMessages` and the optional
//! `tagRoom`.

pub mod client;
pub mod types;

use async_trait::async_trait;
use talkrelay_config::RemoteConfig;
use talkrelay_core::{
    AdapterType, ConversationId, DeliveryRecord, HealthStatus, OutboundWireMessage,
    PluginAdapter, RelayError, RemoteBackend, RemoteMessage,
};
use tracing::{debug, info};

use crate::client::RemoteClient;
use crate::types::{ConfirmMessagesRequest, ReceiveMessageRequest, TagRoomRequest};

/// Remote backend implementing [`RemoteBackend`].
pub struct RemoteAdapter {
    client: RemoteClient,
}

impl RemoteAdapter {
    /// Creates the adapter from the `[remote]` configuration section.
    pub fn new(config: &RemoteConfig) -> Result<Self, RelayError> {
        let client = RemoteClient::new(config)?;
        info!(
            base_url = client.base_url(),
            tagging = client.has_tag_endpoint(),
            "remote backend adapter initialized"
        );
        Ok(Self { client })
    }

    /// Creates an adapter with an existing client (for testing).
    #[cfg(test)]
    fn with_client(client: RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        "remote"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Remote
    }

    /// Probes `getMessages` without confirming, so nothing is consumed.
    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(match self.client.get_messages().await {
            Ok(_) => HealthStatus::Healthy,
            Err(e @ RelayError::Transport { .. }) => HealthStatus::Unhealthy(e.to_string()),
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("remote backend adapter shut down");
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for RemoteAdapter {
    async fn receive_message(&self, msg: &OutboundWireMessage) -> Result<(), RelayError> {
        self.client
            .receive_message(&ReceiveMessageRequest::from(msg))
            .await
    }

    async fn get_messages(&self) -> Result<Vec<RemoteMessage>, RelayError> {
        let response = self.client.get_messages().await?;
        Ok(response
            .messages
            .into_iter()
            .map(RemoteMessage::from)
            .collect())
    }

    async fn confirm_messages(&self, records: &[DeliveryRecord]) -> Result<(), RelayError> {
        self.client
            .confirm_messages(&ConfirmMessagesRequest::from(records))
            .await
    }

    fn supports_tagging(&self) -> bool {
        self.client.has_tag_endpoint()
    }

    async fn tag_room(
        &self,
        conversation: &ConversationId,
        tag: &str,
        value: &str,
    ) -> Result<(), RelayError> {
        self.client
            .tag_room(&TagRoomRequest {
                room_id: conversation.as_str(),
                tag,
                value,
            })
            .await
    }
}
