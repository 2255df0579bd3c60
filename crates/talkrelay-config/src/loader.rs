// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./talkrelay.toml` > `~/.config/talkrelay/talkrelay.toml`
//! > `/etc/talkrelay/talkrelay.toml`, an optional explicit file, and environment
//! variable overrides via the `TALKRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TalkrelayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<TalkrelayConfig, figment::Error> {
    build_figment(None).extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TalkrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TalkrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from the XDG hierarchy plus an explicit file, with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<TalkrelayConfig, figment::Error> {
    build_figment(Some(path)).extract()
}

/// The config file locations consulted, lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/talkrelay/talkrelay.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("talkrelay/talkrelay.toml"));
    }
    paths.push(PathBuf::from("talkrelay.toml"));
    paths
}

/// Build the Figment used for config loading (exposed for diagnostic use).
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/talkrelay/talkrelay.toml`
/// 3. `~/.config/talkrelay/talkrelay.toml`
/// 4. `./talkrelay.toml`
/// 5. `explicit`, when given
/// 6. `TALKRELAY_*` environment variables
pub fn build_figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(TalkrelayConfig::default()));
    for path in config_file_paths() {
        figment = figment.merge(Toml::file(path));
    }
    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: `TALKRELAY_REMOTE_API_KEY` must
/// map to `remote.api_key`, not `remote.api.key`. Keys arrive in their
/// original case, so they are lowercased before the section is matched.
fn env_provider() -> Env {
    Env::prefixed("TALKRELAY_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        section_key(&key).unwrap_or(key).into()
    })
}

/// Rewrites the first `<section>_` of a lowercased env key into `<section>.`.
fn section_key(key: &str) -> Option<String> {
    ["matrix", "remote", "relay"].iter().find_map(|section| {
        key.strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .map(|rest| format!("{section}.{rest}"))
    })
}
