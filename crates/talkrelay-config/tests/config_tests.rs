// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Talkrelay configuration system.

use figment::Jail;
use talkrelay_config::diagnostic::ConfigError;
use talkrelay_config::model::TalkrelayConfig;
use talkrelay_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_talkrelay_config() {
    let toml = r#"
[matrix]
homeserver_url = "https://matrix.example.org"
bot_user = "@relay:example.org"
access_token = "syt_abc"
forward_bot_messages = true

[remote]
protocol = "https"
server = "talks.example.org"
port = 8443
api_key = "secret"
tag_room_path = "/tagRoom"

[relay]
log_level = "debug"
poll_interval_ms = 250
hints = true
inline_outbound_media = false

[[room_tags]]
regex = "!vip"
tag = "tier"
value = "vip"
trigger = "hello vip"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.matrix.homeserver_url, "https://matrix.example.org");
    assert_eq!(config.matrix.bot_user.as_deref(), Some("@relay:example.org"));
    assert!(config.matrix.forward_bot_messages);
    assert_eq!(config.remote.base_url(), "https://talks.example.org:8443");
    assert_eq!(config.remote.api_key.as_deref(), Some("secret"));
    assert_eq!(config.remote.tag_room_path.as_deref(), Some("/tagRoom"));
    assert_eq!(config.relay.log_level, "debug");
    assert_eq!(config.relay.poll_interval_ms, 250);
    assert!(config.relay.hints);
    assert!(!config.relay.inline_outbound_media);
    assert_eq!(config.room_tags.len(), 1);
    assert_eq!(config.room_tags[0].trigger.as_deref(), Some("hello vip"));
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.remote.base_url(), "http://localhost:8080");
    assert_eq!(config.remote.receive_message_path, "/receiveMessage");
    assert_eq!(config.remote.get_messages_path, "/getMessages");
    assert_eq!(config.remote.confirm_messages_path, "/confirmMessages");
    assert!(config.remote.tag_room_path.is_none());
    assert_eq!(config.relay.deduplication_ttl_secs, 600);
    assert_eq!(config.relay.echo_ttl_secs, 5);
    assert_eq!(config.relay.bot_on_regex, "^!on");
    assert_eq!(config.relay.bot_off_regex, "^!off");
    assert!(config.relay.inline_outbound_media);
    assert!(!config.matrix.forward_bot_messages);
    assert!(config.room_tags.is_empty());
}

#[test]
fn unknown_field_in_relay_produces_error() {
    let toml = r#"
[relay]
poll_intervall_ms = 10
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("poll_intervall_ms"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    assert!(format!("{err}").contains("logging") || format!("{err}").contains("unknown field"));
}

/// `TALKRELAY_REMOTE_API_KEY` maps to `remote.api_key`, not `remote.api.key`.
#[test]
fn env_var_maps_underscored_key() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "talkrelay.toml",
            r#"
[remote]
server = "from-file"
api_key = "from-file"
"#,
        )?;
        jail.set_env("TALKRELAY_REMOTE_API_KEY", "from-env");
        jail.set_env("TALKRELAY_RELAY_POLL_INTERVAL_MS", "42");

        let config = load_config()?;
        assert_eq!(config.remote.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.remote.server, "from-file");
        assert_eq!(config.relay.poll_interval_ms, 42);
        Ok(())
    });
}

#[test]
fn explicit_file_overrides_local_file() {
    Jail::expect_with(|jail| {
        jail.create_file("talkrelay.toml", "[remote]\nport = 1000\n")?;
        jail.create_file("override.toml", "[remote]\nport = 2000\n")?;

        let config =
            talkrelay_config::load_config_from_path(std::path::Path::new("override.toml"))?;
        assert_eq!(config.remote.port, 2000);
        Ok(())
    });
}

#[test]
fn serialized_defaults_round_trip_through_figment() {
    use figment::{Figment, providers::Serialized};

    let config: TalkrelayConfig = Figment::new()
        .merge(Serialized::defaults(TalkrelayConfig::default()))
        .merge(("relay.hints", true))
        .extract()
        .expect("defaults should extract");
    assert!(config.relay.hints);
    assert_eq!(config.relay.hints_delay_ms, 1_000);
}

#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[remote]
api_kye = "k"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "api_kye"
                && suggestion.as_deref() == Some("api_key")
                && valid_keys.contains("confirm_messages_path")
        })
    });
    assert!(found, "expected UnknownKey for api_kye, got: {errors:?}");
}

#[test]
fn invalid_type_is_reported_with_dotted_key() {
    let toml = r#"
[relay]
poll_interval_ms = "fast"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "relay.poll_interval_ms")),
        "got: {errors:?}"
    );
}

#[test]
fn room_tag_without_tag_reports_missing_key() {
    let toml = r#"
[[room_tags]]
regex = "^!vip"
value = "gold"
"#;

    let errors = load_and_validate_str(toml).expect_err("tag is required");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key.ends_with("tag"))),
        "got: {errors:?}"
    );
}

#[test]
fn semantic_errors_surface_through_load_and_validate() {
    let toml = r#"
[relay]
bot_off_regex = "(unclosed"
deduplication_cache_size = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.len() >= 2, "all validation errors are collected: {errors:?}");
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "api_kye".to_string(),
        suggestion: Some("api_key".to_string()),
        valid_keys: "protocol, server, port, api_key".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `api_key`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("api_kye"));
}
