// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation on/off switching and declarative room tagging.
//!
//! Both are driven only by bodies the relay's own identity posted, and never
//! by echoes of bodies the relay itself emitted. Patterns match at the start
//! of the body, case-insensitively.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use regex::{Regex, RegexBuilder};
use talkrelay_config::{RelayConfig, RoomTagConfig};
use talkrelay_core::{ConversationId, RelayError};

/// A compiled `[[room_tags]]` entry.
#[derive(Debug, Clone)]
pub struct TagRule {
    pub regex: Regex,
    pub tag: String,
    pub value: String,
    pub trigger: Option<String>,
}

pub struct RoomPolicy {
    on: Regex,
    off: Regex,
    tags: Vec<TagRule>,
    activations: Mutex<HashMap<ConversationId, bool>>,
}

fn anchored(key: &str, pattern: &str) -> Result<Regex, RelayError> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
        .map_err(|e| RelayError::Config(format!("{key} `{pattern}`: {e}")))
}

impl RoomPolicy {
    pub fn from_config(
        relay: &RelayConfig,
        room_tags: &[RoomTagConfig],
    ) -> Result<Self, RelayError> {
        let tags = room_tags
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                Ok(TagRule {
                    regex: anchored(&format!("room_tags[{i}].regex"), &rule.regex)?,
                    tag: rule.tag.clone(),
                    value: rule.value.clone(),
                    trigger: rule.trigger.clone(),
                })
            })
            .collect::<Result<Vec<_>, RelayError>>()?;

        Ok(Self {
            on: anchored("relay.bot_on_regex", &relay.bot_on_regex)?,
            off: anchored("relay.bot_off_regex", &relay.bot_off_regex)?,
            tags,
            activations: Mutex::new(HashMap::new()),
        })
    }

    /// Apply an on/off command. Returns the new state when `body` was one.
    ///
    /// The off pattern is checked first.
    pub fn apply_command(&self, conversation: &ConversationId, body: &str) -> Option<bool> {
        let state = if self.off.is_match(body) {
            false
        } else if self.on.is_match(body) {
            true
        } else {
            return None;
        };
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.clone(), state);
        Some(state)
    }

    /// Conversations are active until switched off.
    pub fn is_active(&self, conversation: &ConversationId) -> bool {
        self.activations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation)
            .copied()
            .unwrap_or(true)
    }

    /// First tag rule whose pattern matches `body`.
    pub fn match_tag(&self, body: &str) -> Option<&TagRule> {
        self.tags.iter().find(|rule| rule.regex.is_match(body))
    }
}
