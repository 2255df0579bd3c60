// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the two sides of the relay.
//!
//! Both adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod remote;
pub mod room;

pub use adapter::PluginAdapter;
pub use remote::RemoteBackend;
pub use room::RoomTransport;
