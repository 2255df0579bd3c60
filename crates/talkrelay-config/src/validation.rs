// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as compilable regexes, URL schemes, and TTL ordering.

use regex::Regex;

use crate::diagnostic::ConfigError;
use crate::model::TalkrelayConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TalkrelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let relay = &config.relay;
    for (key, pattern) in [
        ("relay.bot_on_regex", &relay.bot_on_regex),
        ("relay.bot_off_regex", &relay.bot_off_regex),
    ] {
        if let Err(e) = Regex::new(pattern) {
            fail(format!("{key} `{pattern}` is not a valid regex: {e}"));
        }
    }

    for (i, rule) in config.room_tags.iter().enumerate() {
        if let Err(e) = Regex::new(&rule.regex) {
            fail(format!(
                "room_tags[{i}].regex `{}` is not a valid regex: {e}",
                rule.regex
            ));
        }
        if rule.tag.trim().is_empty() {
            fail(format!("room_tags[{i}].tag must not be empty"));
        }
    }

    if relay.deduplication_cache_size < 1 {
        fail("relay.deduplication_cache_size must be at least 1".to_string());
    }
    if relay.echo_cache_size < 1 {
        fail("relay.echo_cache_size must be at least 1".to_string());
    }
    if relay.echo_ttl_secs < 1 || relay.deduplication_ttl_secs < 1 {
        fail("relay.echo_ttl_secs and relay.deduplication_ttl_secs must be at least 1".to_string());
    } else if relay.echo_ttl_secs >= relay.deduplication_ttl_secs {
        fail(format!(
            "relay.echo_ttl_secs ({}) must be shorter than relay.deduplication_ttl_secs ({})",
            relay.echo_ttl_secs, relay.deduplication_ttl_secs
        ));
    }

    if relay.retry_base_delay_ms < 1 {
        fail("relay.retry_base_delay_ms must be at least 1".to_string());
    }
    if relay.receive_timeout_ms < relay.retry_base_delay_ms {
        fail(format!(
            "relay.receive_timeout_ms ({}) must not be below relay.retry_base_delay_ms ({})",
            relay.receive_timeout_ms, relay.retry_base_delay_ms
        ));
    }

    let remote = &config.remote;
    if remote.protocol != "http" && remote.protocol != "https" {
        fail(format!(
            "remote.protocol must be `http` or `https`, got `{}`",
            remote.protocol
        ));
    }
    if remote.server.trim().is_empty() {
        fail("remote.server must not be empty".to_string());
    }
    for (key, path) in [
        ("remote.receive_message_path", Some(&remote.receive_message_path)),
        ("remote.get_messages_path", Some(&remote.get_messages_path)),
        ("remote.confirm_messages_path", Some(&remote.confirm_messages_path)),
        ("remote.tag_room_path", remote.tag_room_path.as_ref()),
    ] {
        if let Some(path) = path
            && !path.starts_with('/')
        {
            fail(format!("{key} must start with `/`, got `{path}`"));
        }
    }

    if let Some(user) = &config.matrix.bot_user {
        let well_formed = user
            .strip_prefix('@')
            .and_then(|rest| rest.split_once(':'))
            .is_some_and(|(local, server)| !local.is_empty() && !server.is_empty());
        if !well_formed {
            fail(format!(
                "matrix.bot_user `{user}` must look like `@localpart:server`"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
