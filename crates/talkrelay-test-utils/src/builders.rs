// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for the records tests feed into the relay.

use talkrelay_core::{OutboundWireMessage, TextKind, WirePayload};

/// Room events as the room transport would deliver them.
pub mod event {
    use talkrelay_core::{EventContent, InboundEvent, MediaKind, TextKind};

    /// An `m.text` event.
    pub fn text(conversation: &str, event_id: &str, sender: &str, body: &str) -> InboundEvent {
        InboundEvent {
            conversation_id: conversation.into(),
            event_id: event_id.into(),
            sender_id: sender.to_string(),
            timestamp: 1_700_000_000_000,
            event_type: "m.room.message".to_string(),
            body: body.to_string(),
            content: EventContent::Text {
                kind: TextKind::Text,
                format: None,
                formatted_body: None,
            },
        }
    }

    /// An attachment event; `media_ref` is its `mxc://` reference, if any.
    pub fn media(
        conversation: &str,
        event_id: &str,
        sender: &str,
        kind: MediaKind,
        media_ref: Option<&str>,
    ) -> InboundEvent {
        InboundEvent {
            content: EventContent::Media {
                kind,
                media_ref: media_ref.map(str::to_string),
                mime_type: None,
            },
            ..text(conversation, event_id, sender, "attachment")
        }
    }
}

/// Messages as the remote backend would return them.
pub mod remote {
    use talkrelay_core::{MediaKind, MediaPayload, RemoteBody, RemoteMessage};

    fn message(id: &str, conversation: &str, body: RemoteBody) -> RemoteMessage {
        RemoteMessage {
            remote_id: id.into(),
            conversation_id: conversation.into(),
            body,
            action_hints: Vec::new(),
        }
    }

    pub fn text(id: &str, conversation: &str, body: &str) -> RemoteMessage {
        message(id, conversation, RemoteBody::Text(body.to_string()))
    }

    pub fn html(id: &str, conversation: &str, body: &str) -> RemoteMessage {
        message(id, conversation, RemoteBody::Html(body.to_string()))
    }

    pub fn media(
        id: &str,
        conversation: &str,
        kind: MediaKind,
        payload: MediaPayload,
        filename: Option<&str>,
    ) -> RemoteMessage {
        message(
            id,
            conversation,
            RemoteBody::Media {
                kind,
                payload,
                filename: filename.map(str::to_string),
                mime_type: None,
            },
        )
    }

    /// Retract whatever `target` became in the room.
    pub fn delete(id: &str, conversation: &str, target: &str) -> RemoteMessage {
        message(
            id,
            conversation,
            RemoteBody::Delete {
                target: target.to_string(),
            },
        )
    }

    pub fn unsupported(id: &str, conversation: &str, body_type: &str) -> RemoteMessage {
        message(
            id,
            conversation,
            RemoteBody::Unsupported {
                body_type: body_type.to_string(),
            },
        )
    }
}

/// A minimal text wire message.
pub fn wire(conversation: &str, body: &str) -> OutboundWireMessage {
    OutboundWireMessage {
        timestamp: 1_700_000_000_000,
        conversation_id: conversation.into(),
        event_id: "$wire".into(),
        sender_id: "@alice:x".to_string(),
        event_type: "m.room.message".to_string(),
        body: body.to_string(),
        message_type: TextKind::Text.msgtype().to_string(),
        payload: WirePayload::Text {
            format: None,
            formatted_body: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkrelay_core::{EventContent, MediaKind};

    #[test]
    fn media_event_keeps_reference() {
        let ev = event::media("!r:x", "$1", "@a:x", MediaKind::Image, Some("mxc://x/y"));
        assert_eq!(ev.msgtype(), "m.image");
        assert!(matches!(
            ev.content,
            EventContent::Media { media_ref: Some(ref r), .. } if r == "mxc://x/y"
        ));
    }
}
