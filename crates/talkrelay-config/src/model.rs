// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Talkrelay message relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Talkrelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TalkrelayConfig {
    /// Room transport (Matrix homeserver) settings.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Remote messaging backend settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Relay engine tuning.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Ordered tag rules; the first match wins.
    #[serde(default)]
    pub room_tags: Vec<RoomTagConfig>,
}

/// Room transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Base URL of the homeserver, e.g. `https://matrix.example.org`.
    #[serde(default = "default_homeserver_url")]
    pub homeserver_url: String,

    /// The relay's own room identity, e.g. `@relay:example.org`.
    #[serde(default)]
    pub bot_user: Option<String>,

    /// Access token for the bot account. `None` disables the Matrix transport.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Device the access token belongs to. Only consulted when the
    /// homeserver's `whoami` answer omits it.
    #[serde(default)]
    pub device_id: Option<String>,

    /// Long-poll timeout for `/sync`.
    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,

    /// Forward events authored by the relay's own identity to the remote backend.
    #[serde(default)]
    pub forward_bot_messages: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver_url: default_homeserver_url(),
            bot_user: None,
            access_token: None,
            device_id: None,
            sync_timeout_ms: default_sync_timeout_ms(),
            forward_bot_messages: false,
        }
    }
}

fn default_homeserver_url() -> String {
    "http://localhost:8008".to_string()
}

fn default_sync_timeout_ms() -> u64 {
    30_000
}

/// Remote backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// URL scheme, `http` or `https`.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer credential sent on every request.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_receive_message_path")]
    pub receive_message_path: String,

    #[serde(default = "default_get_messages_path")]
    pub get_messages_path: String,

    #[serde(default = "default_confirm_messages_path")]
    pub confirm_messages_path: String,

    /// Optional `tagRoom` endpoint. Tag rules are inert without it.
    #[serde(default)]
    pub tag_room_path: Option<String>,

    /// Fixed per-request network timeout.
    #[serde(default = "default_fixed_timeout_ms")]
    pub fixed_timeout_ms: u64,
}

impl RemoteConfig {
    /// `{protocol}://{server}:{port}`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.server, self.port)
    }

    pub fn fixed_timeout(&self) -> Duration {
        Duration::from_millis(self.fixed_timeout_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            server: default_server(),
            port: default_port(),
            api_key: None,
            receive_message_path: default_receive_message_path(),
            get_messages_path: default_get_messages_path(),
            confirm_messages_path: default_confirm_messages_path(),
            tag_room_path: None,
            fixed_timeout_ms: default_fixed_timeout_ms(),
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_receive_message_path() -> String {
    "/receiveMessage".to_string()
}

fn default_get_messages_path() -> String {
    "/getMessages".to_string()
}

fn default_confirm_messages_path() -> String {
    "/confirmMessages".to_string()
}

fn default_fixed_timeout_ms() -> u64 {
    10_000
}

/// Relay engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Pause between two poller cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause between two messages delivered into the same room.
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,

    /// Ceiling on accumulated backoff for one outbound message.
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// First backoff delay; doubles on every retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Send an options block after messages that carry action hints.
    #[serde(default)]
    pub hints: bool,

    #[serde(default = "default_hints_delay_ms")]
    pub hints_delay_ms: u64,

    /// Matched case-insensitively at the start of bot-authored bodies.
    #[serde(default = "default_bot_on_regex")]
    pub bot_on_regex: String,

    #[serde(default = "default_bot_off_regex")]
    pub bot_off_regex: String,

    #[serde(default = "default_deduplication_cache_size")]
    pub deduplication_cache_size: u64,

    #[serde(default = "default_echo_cache_size")]
    pub echo_cache_size: u64,

    #[serde(default = "default_deduplication_ttl_secs")]
    pub deduplication_ttl_secs: u64,

    #[serde(default = "default_echo_ttl_secs")]
    pub echo_ttl_secs: u64,

    /// Download outbound attachments and send them base64-encoded.
    /// When off, the hosted URI is sent instead.
    #[serde(default = "default_inline_outbound_media")]
    pub inline_outbound_media: bool,

    /// Upper bound on waiting for background tasks at shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval_ms(),
            propagation_delay_ms: default_propagation_delay_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            hints: false,
            hints_delay_ms: default_hints_delay_ms(),
            bot_on_regex: default_bot_on_regex(),
            bot_off_regex: default_bot_off_regex(),
            deduplication_cache_size: default_deduplication_cache_size(),
            echo_cache_size: default_echo_cache_size(),
            deduplication_ttl_secs: default_deduplication_ttl_secs(),
            echo_ttl_secs: default_echo_ttl_secs(),
            inline_outbound_media: default_inline_outbound_media(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_propagation_delay_ms() -> u64 {
    500
}

fn default_receive_timeout_ms() -> u64 {
    60_000
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_hints_delay_ms() -> u64 {
    1_000
}

fn default_bot_on_regex() -> String {
    "^!on".to_string()
}

fn default_bot_off_regex() -> String {
    "^!off".to_string()
}

fn default_deduplication_cache_size() -> u64 {
    10_000
}

fn default_echo_cache_size() -> u64 {
    1_000
}

fn default_deduplication_ttl_secs() -> u64 {
    600
}

fn default_echo_ttl_secs() -> u64 {
    5
}

fn default_inline_outbound_media() -> bool {
    true
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// One declarative tag rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoomTagConfig {
    /// Matched case-insensitively at the start of bot-authored bodies.
    pub regex: String,
    pub tag: String,
    pub value: String,
    /// Forwarded to the remote backend in place of the triggering body.
    #[serde(default)]
    pub trigger: Option<String>,
}
