// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Talkrelay.
//!
//! Provides in-memory adapters for both relay sides, so engine tests run
//! deterministically without a homeserver or a remote backend.
//!
//! # Components
//!
//! - [`MockRoom`] - Room transport with event injection and content capture
//! - [`MockRemote`] - Remote backend with scripted failures and queued batches
//! - [`event`] and [`remote`] - Builders for inbound events and remote messages

pub mod builders;
pub mod mock_remote;
pub mod mock_room;

pub use builders::{event, remote};
pub use mock_remote::{MockRemote, Scripted};
pub use mock_room::MockRoom;
