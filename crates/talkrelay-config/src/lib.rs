// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Talkrelay message relay.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use talkrelay_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Remote backend: {}", config.remote.base_url());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{MatrixConfig, RelayConfig, RemoteConfig, RoomTagConfig, TalkrelayConfig};

/// Load configuration from the XDG hierarchy and validate it.
///
/// On a Figment error the TOML sources are re-read so diagnostics can point
/// at the offending line.
pub fn load_and_validate() -> Result<TalkrelayConfig, Vec<ConfigError>> {
    load_and_validate_path(None)
}

/// Like [`load_and_validate`], with an additional explicit file layered on top.
pub fn load_and_validate_path(
    explicit: Option<&Path>,
) -> Result<TalkrelayConfig, Vec<ConfigError>> {
    let loaded = match explicit {
        Some(path) => loader::load_config_from_path(path),
        None => loader::load_config(),
    };
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let toml_sources = collect_toml_sources(explicit);
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<TalkrelayConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources(explicit: Option<&Path>) -> Vec<(String, String)> {
    let mut candidates = loader::config_file_paths();
    candidates.extend(explicit.map(Path::to_path_buf));

    candidates
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            // Figment records file sources by absolute path.
            let absolute = std::fs::canonicalize(&path).unwrap_or(path);
            Some((absolute.display().to_string(), content))
        })
        .collect()
}
