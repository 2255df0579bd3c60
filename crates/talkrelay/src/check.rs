// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `talkrelay check-config` command implementation.

use talkrelay_config::TalkrelayConfig;

fn set_or_unset(value: &Option<String>) -> &'static str {
    match value {
        Some(v) if !v.trim().is_empty() => "set",
        _ => "unset",
    }
}

/// Human-readable summary of the effective configuration. Credentials are
/// reported only as set or unset.
pub fn summary(config: &TalkrelayConfig) -> String {
    let relay = &config.relay;
    let mut lines = vec![
        "configuration OK".to_string(),
        format!("  matrix.homeserver_url    {}", config.matrix.homeserver_url),
        format!(
            "  matrix.bot_user          {}",
            config.matrix.bot_user.as_deref().unwrap_or("(from access token)")
        ),
        format!("  matrix.access_token      {}", set_or_unset(&config.matrix.access_token)),
        format!(
            "  matrix.device_id         {}",
            config.matrix.device_id.as_deref().unwrap_or("(from access token)")
        ),
        format!("  remote base url          {}", config.remote.base_url()),
        format!("  remote.api_key           {}", set_or_unset(&config.remote.api_key)),
        format!(
            "  remote.tag_room_path     {}",
            config.remote.tag_room_path.as_deref().unwrap_or("(tagging disabled)")
        ),
        format!("  relay.poll_interval_ms   {}", relay.poll_interval_ms),
        format!("  relay.receive_timeout_ms {}", relay.receive_timeout_ms),
        format!("  relay.hints              {}", relay.hints),
    ];
    lines.push(format!("  room_tags                {} rule(s)", config.room_tags.len()));
    lines.join("\n")
}

pub fn print_summary(config: &TalkrelayConfig) {
    println!("{}", summary(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_never_printed() {
        let mut config = TalkrelayConfig::default();
        config.remote.api_key = Some("super-secret-key".into());
        config.matrix.access_token = Some("syt_secret_token".into());

        let text = summary(&config);
        assert!(!text.contains("super-secret-key"));
        assert!(!text.contains("syt_secret_token"));
        assert!(text.contains("remote.api_key           set"));
    }

    #[test]
    fn tagging_state_is_reported() {
        let config = TalkrelayConfig::default();
        assert!(summary(&config).contains("(tagging disabled)"));
    }
}
