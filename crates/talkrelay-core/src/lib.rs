// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Talkrelay message relay.
//!
//! This crate provides the error taxonomy, the data model, and the adapter
//! traits for both sides of the relay: the room transport and the remote
//! backend. The engine in `talkrelay-relay` only talks to these traits.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use types::{
    ActionHint, AdapterType, ConversationId, DeliveryRecord, EventContent, EventId, HealthStatus,
    InboundEvent, MediaDescriptor, MediaKind, MediaPayload, OutboundWireMessage, RemoteBody,
    RemoteId, RemoteMessage, RoomContent, TextKind, WireMedia, WirePayload,
};

pub use traits::{PluginAdapter, RemoteBackend, RoomTransport};
