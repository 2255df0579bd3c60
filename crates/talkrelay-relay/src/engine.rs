// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay engine context.
//!
//! Built once at startup from the configuration and the two adapters. It owns
//! every cache, the room policy, the retry queues and the poller, and runs the
//! room-side intake loop until its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use talkrelay_config::TalkrelayConfig;
use talkrelay_core::{InboundEvent, RelayError, RemoteBackend, RoomTransport};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::cache::{CorrelationStore, DedupCache, EchoCache};
use crate::inbound::InboundBuilder;
use crate::media::MediaPipeline;
use crate::outbound::OutboundBuilder;
use crate::policy::RoomPolicy;
use crate::poller::{Poller, PollerSettings};
use crate::queue::{QueuedEvent, RetryPolicy, RetryQueues};
use crate::shutdown;

const INTAKE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What intake decided for one room event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// A body the relay itself emitted, coming back.
    Echo,
    /// The conversation is switched off.
    Suppressed,
    Duplicate,
    /// Authored by the relay's identity and not forwarded.
    SkippedOwn,
    /// A tag rule's trigger text was queued in place of the event body.
    Triggered,
    Enqueued,
}

pub struct RelayEngine {
    room: Arc<dyn RoomTransport>,
    remote: Arc<dyn RemoteBackend>,
    own_user_id: String,
    forward_bot_messages: bool,
    dedup: DedupCache,
    echo: EchoCache,
    policy: RoomPolicy,
    queues: RetryQueues,
    poller: Arc<Poller>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    shutdown_timeout: Duration,
}

impl RelayEngine {
    pub fn new(
        config: &TalkrelayConfig,
        room: Arc<dyn RoomTransport>,
        remote: Arc<dyn RemoteBackend>,
        cancel: CancellationToken,
    ) -> Result<Self, RelayError> {
        let relay = &config.relay;
        let own_user_id = room.own_user_id().to_string();
        let tracker = TaskTracker::new();

        let dedup = DedupCache::new(
            relay.deduplication_cache_size,
            Duration::from_secs(relay.deduplication_ttl_secs),
        );
        let echo = EchoCache::new(
            own_user_id.clone(),
            relay.echo_cache_size,
            Duration::from_secs(relay.echo_ttl_secs),
        );
        let policy = RoomPolicy::from_config(relay, &config.room_tags)?;

        let media = MediaPipeline::new(Arc::clone(&room));
        let queues = RetryQueues::new(
            Arc::clone(&remote),
            Arc::clone(&room),
            OutboundBuilder::new(media.clone(), relay.inline_outbound_media),
            RetryPolicy::new(
                Duration::from_millis(relay.retry_base_delay_ms),
                Duration::from_millis(relay.receive_timeout_ms),
            ),
            cancel.clone(),
            tracker.clone(),
        );
        let poller = Arc::new(Poller::new(
            Arc::clone(&remote),
            Arc::clone(&room),
            InboundBuilder::new(media),
            echo.clone(),
            CorrelationStore::new(relay.deduplication_cache_size),
            PollerSettings::from(relay),
            cancel.clone(),
        ));

        if !config.room_tags.is_empty() && !remote.supports_tagging() {
            warn!(
                rules = config.room_tags.len(),
                "room tag rules configured but remote.tag_room_path is unset, rules are inert"
            );
        }

        Ok(Self {
            room,
            remote,
            own_user_id,
            forward_bot_messages: config.matrix.forward_bot_messages,
            dedup,
            echo,
            policy,
            queues,
            poller,
            cancel,
            tracker,
            shutdown_timeout: Duration::from_secs(relay.shutdown_timeout_secs),
        })
    }

    pub fn queues(&self) -> &RetryQueues {
        &self.queues
    }

    pub fn policy(&self) -> &RoomPolicy {
        &self.policy
    }

    /// Run one room event through dedup, policy and echo checks, and queue
    /// it for the remote backend when it passes.
    ///
    /// A redelivered event is never acted on twice: commands, tags and
    /// triggers only run on its first observation.
    pub async fn handle_room_event(&self, event: InboundEvent) -> EventDisposition {
        let conversation = &event.conversation_id;
        let duplicate = self.dedup.is_duplicate(&event.event_id);
        let own = event.sender_id == self.own_user_id;
        let echo = own && self.echo.is_echo(&event.sender_id, &event.body);

        if own && !echo && !duplicate {
            if let Some(active) = self.policy.apply_command(conversation, &event.body) {
                info!(
                    conversation_id = %conversation,
                    active,
                    "relay switched {}",
                    if active { "on" } else { "off" }
                );
            }
        }

        if !self.policy.is_active(conversation) {
            if !duplicate {
                if let Err(e) = self.room.mark_read(conversation, &event.event_id).await {
                    warn!(event_id = %event.event_id, error = %e, "failed to mark event read");
                }
            }
            debug!(
                conversation_id = %conversation,
                event_id = %event.event_id,
                "relay off, event suppressed"
            );
            return EventDisposition::Suppressed;
        }

        if duplicate {
            debug!(event_id = %event.event_id, "duplicate event, skipped");
            return EventDisposition::Duplicate;
        }

        if own && !echo && self.remote.supports_tagging() {
            if let Some(rule) = self.policy.match_tag(&event.body) {
                match self.remote.tag_room(conversation, &rule.tag, &rule.value).await {
                    Ok(()) => info!(
                        conversation_id = %conversation,
                        tag = %rule.tag,
                        value = %rule.value,
                        "room tagged"
                    ),
                    Err(e) => error!(
                        conversation_id = %conversation,
                        tag = %rule.tag,
                        error = %e,
                        "cannot tag room"
                    ),
                }
                if let Some(trigger) = &rule.trigger {
                    self.queues
                        .enqueue(QueuedEvent::new(event.clone(), Some(trigger.clone())));
                    return EventDisposition::Triggered;
                }
            }
        }

        if own {
            if echo {
                debug!(event_id = %event.event_id, "echo of relayed content, skipped");
                return EventDisposition::Echo;
            }
            if !self.forward_bot_messages {
                return EventDisposition::SkippedOwn;
            }
        }

        self.queues.enqueue(QueuedEvent::new(event, None));
        EventDisposition::Enqueued
    }

    /// Starts the poller and consumes room events until cancelled.
    pub async fn run(&self) {
        self.tracker.spawn(Arc::clone(&self.poller).run());
        info!(own_user_id = %self.own_user_id, "relay running");

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = self.room.next_event() => next,
            };
            match event {
                Ok(event) => {
                    self.handle_room_event(event).await;
                }
                Err(e) => {
                    warn!(error = %e, "room event stream failed");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(INTAKE_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!("room intake stopped");
    }

    /// Cancels every relay task, waits for them, then shuts the adapters down.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        shutdown::drain(&self.tracker, self.shutdown_timeout).await;

        if let Err(e) = self.room.shutdown().await {
            warn!(adapter = self.room.name(), error = %e, "adapter shutdown failed");
        }
        if let Err(e) = self.remote.shutdown().await {
            warn!(adapter = self.remote.name(), error = %e, "adapter shutdown failed");
        }
        info!("relay stopped");
    }
}
