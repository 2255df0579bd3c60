// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote backend trait: the polling-based messaging side of the relay.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationId, DeliveryRecord, OutboundWireMessage, RemoteMessage};

/// Adapter for the external messaging backend.
///
/// Every call maps its failure onto the relay taxonomy: 4xx answers are
/// [`RelayError::ClientRequest`], other non-200 answers are
/// [`RelayError::Protocol`], network failures are [`RelayError::Transport`].
#[async_trait]
pub trait RemoteBackend: PluginAdapter {
    /// Delivers one room event to the backend (`receiveMessage`).
    async fn receive_message(&self, msg: &OutboundWireMessage) -> Result<(), RelayError>;

    /// Fetches the backend's pending messages (`getMessages`).
    async fn get_messages(&self) -> Result<Vec<RemoteMessage>, RelayError>;

    /// Reports delivered messages (`confirmMessages`). A report, never a trigger.
    async fn confirm_messages(&self, records: &[DeliveryRecord]) -> Result<(), RelayError>;

    /// Whether the backend exposes `tagRoom`.
    fn supports_tagging(&self) -> bool;

    /// Sets `tag=value` on a conversation (`tagRoom`).
    async fn tag_room(
        &self,
        conversation: &ConversationId,
        tag: &str,
        value: &str,
    ) -> Result<(), RelayError>;
}
