// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Talkrelay relay engine.
//!
//! Moves room events to the remote backend through per-conversation retry
//! queues, and remote messages into rooms through the poller. Duplicate and
//! echo suppression, media resolution and the per-room on/off and tagging
//! policy all live here; the two sides are reached only through the
//! `talkrelay-core` adapter traits.

pub mod cache;
pub mod engine;
pub mod inbound;
pub mod media;
pub mod outbound;
pub mod poller;
pub mod policy;
pub mod queue;
pub mod shutdown;

pub use cache::{CorrelationStore, DedupCache, EchoCache};
pub use engine::{EventDisposition, RelayEngine};
pub use poller::{Outcome, Poller, PollerSettings};
pub use queue::{QueuedEvent, RetryPolicy, RetryQueues};
pub use shutdown::install_signal_handler;
