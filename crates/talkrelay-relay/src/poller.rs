// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The poller: moves pending remote messages into their rooms and confirms
//! them back to the remote backend.
//!
//! One cycle is fetch, group by conversation, deliver each group in its own
//! task (in fetch order, spaced by the propagation delay), then confirm every
//! delivered message in a single call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use talkrelay_config::RelayConfig;
use talkrelay_core::{
    ConversationId, DeliveryRecord, EventId, RemoteBackend, RemoteBody, RemoteId, RemoteMessage,
    RoomContent, RoomTransport,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CorrelationStore, EchoCache};
use crate::inbound::{InboundBuilder, hints_content};

const REDACTION_REASON: &str = "deleted by remote backend";

/// Timing knobs for the poller.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub interval: Duration,
    pub propagation_delay: Duration,
    pub hints: bool,
    pub hints_delay: Duration,
}

impl From<&RelayConfig> for PollerSettings {
    fn from(relay: &RelayConfig) -> Self {
        Self {
            interval: Duration::from_millis(relay.poll_interval_ms),
            propagation_delay: Duration::from_millis(relay.propagation_delay_ms),
            hints: relay.hints,
            hints_delay: Duration::from_millis(relay.hints_delay_ms),
        }
    }
}

/// What happened to one remote message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A room event now exists for it.
    Delivered {
        event_id: EventId,
        media_uri: Option<String>,
    },
    /// Nothing can ever be posted for it; confirm without an event id.
    Settled,
    /// Leave unconfirmed so the next fetch returns it again.
    Failed,
}

pub struct Poller {
    remote: Arc<dyn RemoteBackend>,
    room: Arc<dyn RoomTransport>,
    builder: InboundBuilder,
    echo: EchoCache,
    correlation: CorrelationStore,
    settings: PollerSettings,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        remote: Arc<dyn RemoteBackend>,
        room: Arc<dyn RoomTransport>,
        builder: InboundBuilder,
        echo: EchoCache,
        correlation: CorrelationStore,
        settings: PollerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            remote,
            room,
            builder,
            echo,
            correlation,
            settings,
            cancel,
        }
    }

    /// Runs cycles until cancelled. A cycle in progress is allowed to finish.
    pub async fn run(self: Arc<Self>) {
        info!(interval_ms = self.settings.interval.as_millis() as u64, "poller started");
        loop {
            self.poll_once().await;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
        info!("poller stopped");
    }

    /// One fetch-deliver-confirm cycle. Returns the records confirmed.
    pub async fn poll_once(self: &Arc<Self>) -> Vec<DeliveryRecord> {
        let messages = match self.remote.get_messages().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "cannot fetch remote messages, will retry");
                return Vec::new();
            }
        };
        if messages.is_empty() {
            return Vec::new();
        }
        debug!(count = messages.len(), "fetched remote messages");

        let mut tasks = JoinSet::new();
        for (conversation, batch) in group_by_conversation(messages) {
            let this = Arc::clone(self);
            tasks.spawn(async move { this.deliver_conversation(conversation, batch).await });
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(delivered) => records.extend(delivered),
                Err(e) => error!(error = %e, "conversation delivery task failed"),
            }
        }

        if records.is_empty() {
            return records;
        }
        match self.remote.confirm_messages(&records).await {
            Ok(()) => debug!(count = records.len(), "confirmed remote messages"),
            Err(e) => error!(
                count = records.len(),
                error = %e,
                "cannot confirm remote messages, will retry"
            ),
        }
        records
    }

    async fn deliver_conversation(
        &self,
        conversation: ConversationId,
        batch: Vec<RemoteMessage>,
    ) -> Vec<DeliveryRecord> {
        let mut records = Vec::new();
        for (i, message) in batch.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.propagation_delay).await;
            }
            if self.cancel.is_cancelled() {
                debug!(
                    conversation_id = %conversation,
                    left = batch.len() - i,
                    "shutting down, remaining messages left for the next run"
                );
                break;
            }

            match self.deliver(message).await {
                Outcome::Delivered {
                    event_id,
                    media_uri,
                } => {
                    self.correlation
                        .insert(message.remote_id.clone(), event_id.clone());
                    if self.settings.hints && !message.action_hints.is_empty() {
                        self.send_hints(message).await;
                    }
                    records.push(DeliveryRecord {
                        remote_id: message.remote_id.clone(),
                        room_event_id: Some(event_id),
                        media_uri,
                    });
                }
                Outcome::Settled => records.push(DeliveryRecord {
                    remote_id: message.remote_id.clone(),
                    room_event_id: None,
                    media_uri: None,
                }),
                Outcome::Failed => {}
            }
        }
        records
    }

    /// Deliver a single remote message into its room.
    pub async fn deliver(&self, message: &RemoteMessage) -> Outcome {
        let conversation = &message.conversation_id;
        match &message.body {
            RemoteBody::Delete { target } => self.retract(message, target).await,
            RemoteBody::Unsupported { body_type } => {
                warn!(
                    remote_id = %message.remote_id,
                    body_type,
                    "unsupported body type, skipped"
                );
                Outcome::Settled
            }
            _ => {
                let content = match self.builder.build(message).await {
                    Ok(content) => content,
                    Err(e) => {
                        error!(
                            remote_id = %message.remote_id,
                            body_type = message.body_type(),
                            error = %e,
                            "cannot build room content, propagation cancelled"
                        );
                        return Outcome::Failed;
                    }
                };
                if !matches!(content, RoomContent::Media { .. }) {
                    self.echo.record_echo_candidate(content.body());
                }
                match self.room.send_content(conversation, &content).await {
                    Ok(event_id) => {
                        debug!(
                            remote_id = %message.remote_id,
                            event_id = %event_id,
                            "propagated remote message"
                        );
                        Outcome::Delivered {
                            event_id,
                            media_uri: content.media_uri().map(str::to_string),
                        }
                    }
                    Err(e) => {
                        error!(
                            remote_id = %message.remote_id,
                            conversation_id = %conversation,
                            error = %e,
                            "cannot propagate remote message"
                        );
                        Outcome::Failed
                    }
                }
            }
        }
    }

    async fn retract(&self, message: &RemoteMessage, target: &str) -> Outcome {
        let conversation = &message.conversation_id;
        let event_id = if target.starts_with('$') {
            Some(EventId::from(target))
        } else {
            self.correlation.get(&RemoteId::from(target))
        };
        let Some(event_id) = event_id else {
            warn!(
                remote_id = %message.remote_id,
                target,
                "delete target has no known room event, skipped"
            );
            return Outcome::Settled;
        };

        let redaction = match self
            .room
            .redact(conversation, &event_id, Some(REDACTION_REASON))
            .await
        {
            Ok(redaction) => redaction,
            Err(e) => {
                error!(
                    remote_id = %message.remote_id,
                    event_id = %event_id,
                    error = %e,
                    "cannot retract room event"
                );
                return Outcome::Failed;
            }
        };

        // The redaction comes back through the room like any other event.
        match self.room.get_event(conversation, &redaction).await {
            Ok(event) => {
                if let Some(body) = redaction_body(&event) {
                    self.echo.record_echo_candidate(body);
                }
            }
            Err(e) => debug!(event_id = %redaction, error = %e, "cannot fetch redaction event"),
        }

        debug!(remote_id = %message.remote_id, event_id = %event_id, "retracted room event");
        Outcome::Delivered {
            event_id: redaction,
            media_uri: None,
        }
    }

    async fn send_hints(&self, message: &RemoteMessage) {
        let content = hints_content(&message.action_hints);
        tokio::time::sleep(self.settings.hints_delay).await;
        self.echo.record_echo_candidate(content.body());
        match self
            .room
            .send_content(&message.conversation_id, &content)
            .await
        {
            Ok(_) => debug!(remote_id = %message.remote_id, "sent hints"),
            Err(e) => error!(
                remote_id = %message.remote_id,
                error = %e,
                "cannot send hints"
            ),
        }
    }
}

fn redaction_body(event: &serde_json::Value) -> Option<&str> {
    let content = event.get("content")?;
    content
        .get("body")
        .or_else(|| content.get("reason"))
        .and_then(serde_json::Value::as_str)
}

/// Groups messages per conversation, keeping fetch order within each group
/// and first-appearance order across groups.
pub fn group_by_conversation(
    messages: Vec<RemoteMessage>,
) -> Vec<(ConversationId, Vec<RemoteMessage>)> {
    let mut index: HashMap<ConversationId, usize> = HashMap::new();
    let mut groups: Vec<(ConversationId, Vec<RemoteMessage>)> = Vec::new();
    for message in messages {
        match index.get(&message.conversation_id) {
            Some(&i) => groups[i].1.push(message),
            None => {
                index.insert(message.conversation_id.clone(), groups.len());
                groups.push((message.conversation_id.clone(), vec![message]));
            }
        }
    }
    groups
}
