// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation FIFO retry queues towards the remote backend.
//!
//! Each conversation with pending events owns one lane and exactly one
//! worker task. The worker is spawned by the enqueue that creates the lane
//! and removes the lane, under the same lock, when it finds it empty. These
//! are the only two mutations of the lane map, so a lane never has two
//! workers and never outlives its worker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use talkrelay_core::{
    ConversationId, InboundEvent, RelayError, RemoteBackend, RoomTransport,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::outbound::{Network, OutboundBuilder};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, timeout: Duration) -> Self {
        Self {
            base_delay,
            timeout,
        }
    }

    /// `base * 2^retry`
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1_u32 << retry.min(20))
    }

    /// The next sleep, or `None` once it would push the total wait past the timeout.
    pub fn next_delay(&self, retry: u32, waited: Duration) -> Option<Duration> {
        let delay = self.delay_for_retry(retry);
        (waited + delay <= self.timeout).then_some(delay)
    }
}

/// A room event waiting for delivery.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event: InboundEvent,
    /// Sent instead of the event's own body (tag rule triggers).
    pub override_body: Option<String>,
    pub enqueued_at: Instant,
}

impl QueuedEvent {
    pub fn new(event: InboundEvent, override_body: Option<String>) -> Self {
        Self {
            event,
            override_body,
            enqueued_at: Instant::now(),
        }
    }
}

/// How one queued event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Delivered,
    Rejected,
    Unbuildable,
    TimedOut,
    Abandoned,
}

/// Owner of all conversation lanes and their workers.
#[derive(Clone)]
pub struct RetryQueues {
    inner: Arc<QueueInner>,
}

type Lanes = HashMap<ConversationId, VecDeque<QueuedEvent>>;

struct QueueInner {
    lanes: Mutex<Lanes>,
    remote: Arc<dyn RemoteBackend>,
    room: Arc<dyn RoomTransport>,
    builder: OutboundBuilder,
    policy: RetryPolicy,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl RetryQueues {
    pub fn new(
        remote: Arc<dyn RemoteBackend>,
        room: Arc<dyn RoomTransport>,
        builder: OutboundBuilder,
        policy: RetryPolicy,
        cancel: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                lanes: Mutex::new(HashMap::new()),
                remote,
                room,
                builder,
                policy,
                cancel,
                tracker,
            }),
        }
    }

    /// Append to the conversation's lane, starting its worker if it has none.
    pub fn enqueue(&self, item: QueuedEvent) {
        let conversation = item.event.conversation_id.clone();
        let spawn = {
            let mut lanes = self.inner.lock_lanes();
            match lanes.get_mut(&conversation) {
                Some(lane) => {
                    lane.push_back(item);
                    false
                }
                None => {
                    lanes.insert(conversation.clone(), VecDeque::from([item]));
                    true
                }
            }
        };

        if spawn {
            debug!(conversation_id = %conversation, "starting queue worker");
            let inner = Arc::clone(&self.inner);
            self.inner
                .tracker
                .spawn(async move { inner.run_lane(conversation).await });
        }
    }

    /// Number of conversations that currently have a worker.
    pub fn active_lanes(&self) -> usize {
        self.inner.lock_lanes().len()
    }

    /// Events still waiting in `conversation`'s lane (excluding the one in flight).
    pub fn pending(&self, conversation: &ConversationId) -> usize {
        self.inner
            .lock_lanes()
            .get(conversation)
            .map_or(0, VecDeque::len)
    }
}

impl QueueInner {
    fn lock_lanes(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the next item, or retire the lane when it is empty.
    fn next_item(&self, conversation: &ConversationId) -> Option<QueuedEvent> {
        let mut lanes = self.lock_lanes();
        let item = lanes.get_mut(conversation).and_then(VecDeque::pop_front);
        if item.is_none() {
            lanes.remove(conversation);
        }
        item
    }

    async fn run_lane(self: Arc<Self>, conversation: ConversationId) {
        while let Some(item) = self.next_item(&conversation) {
            if self.cancel.is_cancelled() {
                let remaining = self
                    .lock_lanes()
                    .remove(&conversation)
                    .map_or(0, |lane| lane.len());
                warn!(
                    conversation_id = %conversation,
                    abandoned = remaining + 1,
                    "shutting down, undelivered events abandoned"
                );
                return;
            }
            self.deliver(item).await;
        }
        debug!(conversation_id = %conversation, "queue drained, worker stopped");
    }

    async fn deliver(&self, item: QueuedEvent) -> Resolution {
        let event = &item.event;
        let wire = match self
            .builder
            .build(event, item.override_body.as_deref())
            .await
        {
            Ok(wire) => wire,
            Err(e) => {
                warn!(
                    conversation_id = %event.conversation_id,
                    event_id = %event.event_id,
                    error = %e,
                    "event cannot be relayed, dropped"
                );
                return Resolution::Unbuildable;
            }
        };

        let mut retry = 0;
        let mut waited = Duration::ZERO;
        loop {
            let err = match self.remote.receive_message(&wire).await {
                Ok(()) => {
                    debug!(
                        conversation_id = %event.conversation_id,
                        event_id = %event.event_id,
                        network = %Network::of(&event.sender_id),
                        attempts = retry + 1,
                        queued_ms = item.enqueued_at.elapsed().as_millis() as u64,
                        "event relayed to remote backend"
                    );
                    let marked = self
                        .room
                        .mark_read(&event.conversation_id, &event.event_id)
                        .await;
                    if let Err(e) = marked {
                        warn!(event_id = %event.event_id, error = %e, "failed to mark event read");
                    }
                    return Resolution::Delivered;
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                warn!(
                    conversation_id = %event.conversation_id,
                    event_id = %event.event_id,
                    error = %err,
                    "remote backend rejected event, discarded"
                );
                return Resolution::Rejected;
            }

            let Some(delay) = self.policy.next_delay(retry, waited) else {
                let timeout = RelayError::Timeout { duration: waited };
                error!(
                    conversation_id = %event.conversation_id,
                    event_id = %event.event_id,
                    error = %timeout,
                    last_error = %err,
                    "event dropped"
                );
                return Resolution::TimedOut;
            };

            warn!(
                conversation_id = %event.conversation_id,
                event_id = %event.event_id,
                attempt = retry + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "remote delivery failed, will retry"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!(
                        conversation_id = %event.conversation_id,
                        event_id = %event.event_id,
                        "shutting down, event abandoned during backoff"
                    );
                    return Resolution::Abandoned;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            waited += delay;
            retry += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaPipeline;
    use talkrelay_test_utils::{MockRemote, MockRoom, Scripted, event};
    use tracing_test::traced_test;

    const BASE: Duration = Duration::from_millis(100);

    fn setup(timeout: Duration) -> (RetryQueues, Arc<MockRoom>, Arc<MockRemote>, TaskTracker) {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let remote = Arc::new(MockRemote::new());
        let tracker = TaskTracker::new();
        let queues = RetryQueues::new(
            remote.clone(),
            room.clone(),
            OutboundBuilder::new(MediaPipeline::new(room.clone()), true),
            RetryPolicy::new(BASE, timeout),
            CancellationToken::new(),
            tracker.clone(),
        );
        (queues, room, remote, tracker)
    }

    fn text(conv: &str, id: &str, body: &str) -> QueuedEvent {
        QueuedEvent::new(event::text(conv, id, "@alice:x", body), None)
    }

    async fn drain(tracker: &TaskTracker) {
        tracker.close();
        tracker.wait().await;
    }

    #[test]
    fn backoff_doubles_until_timeout() {
        let policy = RetryPolicy::new(BASE, Duration::from_millis(700));
        assert_eq!(policy.delay_for_retry(0), BASE);
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(800));
        assert_eq!(policy.next_delay(0, Duration::ZERO), Some(BASE));
        assert_eq!(
            policy.next_delay(2, Duration::from_millis(300)),
            Some(Duration::from_millis(400))
        );
        assert_eq!(policy.next_delay(3, Duration::from_millis(700)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_order_and_retires_lane() {
        let (queues, room, remote, tracker) = setup(Duration::from_secs(10));
        for (i, body) in ["one", "two", "three"].iter().enumerate() {
            queues.enqueue(text("!a:x", &format!("$a{i}"), body));
        }
        queues.enqueue(text("!b:x", "$b0", "other"));
        assert_eq!(queues.active_lanes(), 2);

        drain(&tracker).await;

        let bodies: Vec<_> = remote
            .received_in("!a:x")
            .await
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, ["one", "two", "three"]);
        assert_eq!(remote.received_in("!b:x").await.len(), 1);
        assert_eq!(queues.active_lanes(), 0);
        assert_eq!(room.read_markers().await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let (queues, _room, remote, tracker) = setup(Duration::from_secs(10));
        remote
            .script_receive([Scripted::TransportDown, Scripted::Status(503), Scripted::Ok])
            .await;

        let start = Instant::now();
        queues.enqueue(text("!a:x", "$1", "hello"));
        drain(&tracker).await;

        assert_eq!(remote.receive_attempts().await, 3);
        assert_eq!(remote.received().await.len(), 1);
        assert_eq!(start.elapsed(), BASE + BASE * 2);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn timeout_drops_item_and_queue_moves_on() {
        let (queues, _room, remote, tracker) = setup(Duration::from_millis(700));
        remote
            .script_receive(std::iter::repeat_n(Scripted::TransportDown, 4))
            .await;

        queues.enqueue(text("!a:x", "$1", "doomed"));
        queues.enqueue(text("!a:x", "$2", "survivor"));
        drain(&tracker).await;

        // 100 + 200 + 400 fit in 700ms, the next 800ms does not.
        assert_eq!(remote.receive_attempts().await, 5);
        let delivered: Vec<_> = remote.received().await.into_iter().map(|m| m.body).collect();
        assert_eq!(delivered, ["survivor"]);
        assert!(logs_contain("event dropped"));
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let (queues, room, remote, tracker) = setup(Duration::from_secs(10));
        remote.script_receive([Scripted::Status(400)]).await;

        queues.enqueue(text("!a:x", "$1", "bad"));
        queues.enqueue(text("!a:x", "$2", "good"));
        drain(&tracker).await;

        assert_eq!(remote.receive_attempts().await, 2);
        assert_eq!(remote.received().await[0].body, "good");
        assert!(logs_contain("remote backend rejected event, discarded"));
        assert_eq!(room.read_markers().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unbuildable_media_does_not_block_lane() {
        let (queues, _room, remote, tracker) = setup(Duration::from_secs(10));
        queues.enqueue(QueuedEvent::new(
            event::media("!a:x", "$m", "@alice:x", talkrelay_core::MediaKind::Image, None),
            None,
        ));
        queues.enqueue(text("!a:x", "$t", "after media"));
        drain(&tracker).await;

        assert_eq!(remote.receive_attempts().await, 1);
        assert_eq!(remote.received().await[0].body, "after media");
    }

    #[tokio::test(start_paused = true)]
    async fn new_enqueue_after_drain_respawns_worker() {
        let (queues, _room, remote, tracker) = setup(Duration::from_secs(10));
        queues.enqueue(text("!a:x", "$1", "first"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queues.active_lanes(), 0);

        queues.enqueue(text("!a:x", "$2", "second"));
        drain(&tracker).await;
        assert_eq!(remote.received().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let remote = Arc::new(MockRemote::new());
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let queues = RetryQueues::new(
            remote.clone(),
            room.clone(),
            OutboundBuilder::new(MediaPipeline::new(room.clone()), true),
            RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(600)),
            cancel.clone(),
            tracker.clone(),
        );
        remote
            .script_receive(std::iter::repeat_n(Scripted::TransportDown, 10))
            .await;

        queues.enqueue(text("!a:x", "$1", "stuck"));
        queues.enqueue(text("!a:x", "$2", "never sent"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        drain(&tracker).await;

        assert_eq!(remote.receive_attempts().await, 1);
        assert_eq!(queues.active_lanes(), 0);
    }
}
