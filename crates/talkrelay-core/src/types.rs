// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model shared by the room transport, the remote backend, and the relay engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};

/// Stable identifier of a room/chat. Key for all per-conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

/// Identifier of an event in the room transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

/// Identifier the remote backend assigns to one of its messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(ConversationId);
string_id!(EventId);
string_id!(RemoteId);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Which side of the relay an adapter plugs into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Room,
    Remote,
}

/// Text-like room message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Notice,
    Emote,
}

impl TextKind {
    pub fn msgtype(self) -> &'static str {
        match self {
            Self::Text => "m.text",
            Self::Notice => "m.notice",
            Self::Emote => "m.emote",
        }
    }
}

/// Attachment kinds shared by both sides of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    pub fn msgtype(self) -> &'static str {
        match self {
            Self::Image => "m.image",
            Self::Video => "m.video",
            Self::Audio => "m.audio",
            Self::File => "m.file",
        }
    }

    /// The remote backend's `bodyType` name for this kind.
    pub fn body_type(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
            Self::File => "FILE",
        }
    }

    pub fn from_body_type(s: &str) -> Option<Self> {
        match s {
            "IMAGE" => Some(Self::Image),
            "VIDEO" => Some(Self::Video),
            "AUDIO" => Some(Self::Audio),
            "FILE" => Some(Self::File),
            _ => None,
        }
    }
}

/// Kind-specific part of a room event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventContent {
    Text {
        kind: TextKind,
        format: Option<String>,
        formatted_body: Option<String>,
    },
    Location {
        geo_uri: String,
    },
    Media {
        kind: MediaKind,
        /// Room-side reference of the attachment (`mxc://...`), if any.
        media_ref: Option<String>,
        mime_type: Option<String>,
    },
    /// Any other message type; carried through so policy can still see the body.
    Other {
        msgtype: String,
    },
}

/// A message event captured from the room transport. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    pub event_id: EventId,
    pub sender_id: String,
    /// Origin server timestamp in milliseconds.
    pub timestamp: i64,
    pub event_type: String,
    pub body: String,
    pub content: EventContent,
}

impl InboundEvent {
    /// Room-side message type string (`m.text`, `m.image`, ...).
    pub fn msgtype(&self) -> &str {
        match &self.content {
            EventContent::Text { kind, .. } => kind.msgtype(),
            EventContent::Location { .. } => "m.location",
            EventContent::Media { kind, .. } => kind.msgtype(),
            EventContent::Other { msgtype } => msgtype,
        }
    }
}

/// Attachment as carried to the remote backend: either inline bytes or an
/// already-hosted URI, never both and never neither.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMedia {
    Inline {
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
    Hosted {
        mime_type: Option<String>,
        uri: String,
    },
}

/// The one kind-specific field group of an outbound wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum WirePayload {
    Text {
        format: Option<String>,
        formatted_body: Option<String>,
    },
    Location {
        geo_uri: String,
    },
    Media(WireMedia),
    /// Message types with no extra fields.
    Bare,
}

/// Normalized record sent to the remote backend's `receiveMessage` endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundWireMessage {
    pub timestamp: i64,
    pub conversation_id: ConversationId,
    pub event_id: EventId,
    pub sender_id: String,
    pub event_type: String,
    pub body: String,
    pub message_type: String,
    pub payload: WirePayload,
}

/// One entry of the remote backend's optional `actions` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHint {
    pub key: String,
    pub text: String,
}

/// Where the bytes of an inbound attachment come from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPayload {
    /// Decoded inline payload; must be uploaded to the room transport.
    Inline(Vec<u8>),
    /// Already hosted by the room transport; must not be re-uploaded.
    Hosted(String),
    /// The record carried nothing usable. The reason is kept for logging.
    Unresolved(String),
}

/// Kind-specific body of a remote message.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteBody {
    Text(String),
    Html(String),
    GeoUri(String),
    Media {
        kind: MediaKind,
        payload: MediaPayload,
        filename: Option<String>,
        mime_type: Option<String>,
    },
    /// Retract the room event previously produced for `target`.
    Delete { target: String },
    /// A `bodyType` this relay does not understand.
    Unsupported { body_type: String },
}

/// A message fetched from the remote backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessage {
    pub remote_id: RemoteId,
    pub conversation_id: ConversationId,
    pub body: RemoteBody,
    pub action_hints: Vec<ActionHint>,
}

impl RemoteMessage {
    /// The remote `bodyType` name, for logging.
    pub fn body_type(&self) -> &str {
        match &self.body {
            RemoteBody::Text(_) => "TEXT",
            RemoteBody::Html(_) => "HTML",
            RemoteBody::GeoUri(_) => "GEO_URI",
            RemoteBody::Media { kind, .. } => kind.body_type(),
            RemoteBody::Delete { .. } => "DELETE_MESSAGE",
            RemoteBody::Unsupported { body_type } => body_type,
        }
    }
}

/// Attachment metadata derived while building one message. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub uri: String,
    pub filename: String,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Duration in milliseconds.
    pub duration: Option<u64>,
    pub size: usize,
}

/// Content to be posted into a room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomContent {
    Notice {
        body: String,
        formatted_body: Option<String>,
    },
    Location {
        body: String,
        geo_uri: String,
    },
    Media {
        kind: MediaKind,
        descriptor: MediaDescriptor,
    },
}

impl RoomContent {
    pub fn plain(body: impl Into<String>) -> Self {
        Self::Notice {
            body: body.into(),
            formatted_body: None,
        }
    }

    /// The plain-text body the room will display, used as the echo key.
    pub fn body(&self) -> &str {
        match self {
            Self::Notice { body, .. } | Self::Location { body, .. } => body,
            Self::Media { descriptor, .. } => &descriptor.filename,
        }
    }

    /// The hosted URI of the attachment, if this is media content.
    pub fn media_uri(&self) -> Option<&str> {
        match self {
            Self::Media { descriptor, .. } => Some(&descriptor.uri),
            _ => None,
        }
    }

    /// Serializes to `m.room.message` event content.
    pub fn to_event_content(&self) -> Value {
        match self {
            Self::Notice {
                body,
                formatted_body,
            } => {
                let mut content = json!({ "msgtype": "m.notice", "body": body });
                if let Some(html) = formatted_body {
                    content["format"] = json!("org.matrix.custom.html");
                    content["formatted_body"] = json!(html);
                }
                content
            }
            Self::Location { body, geo_uri } => json!({
                "msgtype": "m.location",
                "body": body,
                "geo_uri": geo_uri,
            }),
            Self::Media { kind, descriptor } => {
                let mut info = Map::new();
                info.insert("mimetype".into(), json!(descriptor.mime_type));
                info.insert("size".into(), json!(descriptor.size));
                if let Some(w) = descriptor.width {
                    info.insert("w".into(), json!(w));
                }
                if let Some(h) = descriptor.height {
                    info.insert("h".into(), json!(h));
                }
                if let Some(d) = descriptor.duration {
                    info.insert("duration".into(), json!(d));
                }
                json!({
                    "msgtype": kind.msgtype(),
                    "body": descriptor.filename,
                    "url": descriptor.uri,
                    "info": Value::Object(info),
                })
            }
        }
    }
}

/// Correlation triple reported back to the remote backend after delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub remote_id: RemoteId,
    /// `None` when no room event was expected (unsupported kinds, unknown retraction targets).
    pub room_event_id: Option<EventId>,
    pub media_uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> MediaDescriptor {
        MediaDescriptor {
            uri: "mxc://example.org/abc".into(),
            filename: "cat.png".into(),
            mime_type: "image/png".into(),
            width: Some(640),
            height: Some(480),
            duration: None,
            size: 1234,
        }
    }

    #[test]
    fn plain_notice_has_no_format_fields() {
        let content = RoomContent::plain("hello").to_event_content();
        assert_eq!(content["msgtype"], "m.notice");
        assert_eq!(content["body"], "hello");
        assert!(content.get("format").is_none());
        assert!(content.get("formatted_body").is_none());
    }

    #[test]
    fn html_notice_carries_custom_html_format() {
        let content = RoomContent::Notice {
            body: "bold".into(),
            formatted_body: Some("<b>bold</b>".into()),
        }
        .to_event_content();
        assert_eq!(content["format"], "org.matrix.custom.html");
        assert_eq!(content["formatted_body"], "<b>bold</b>");
    }

    #[test]
    fn media_content_uses_kind_msgtype_and_skips_missing_info() {
        let content = RoomContent::Media {
            kind: MediaKind::Image,
            descriptor: descriptor(),
        };
        assert_eq!(content.body(), "cat.png");
        assert_eq!(content.media_uri(), Some("mxc://example.org/abc"));

        let json = content.to_event_content();
        assert_eq!(json["msgtype"], "m.image");
        assert_eq!(json["url"], "mxc://example.org/abc");
        assert_eq!(json["info"]["w"], 640);
        assert!(json["info"].get("duration").is_none());
    }

    #[test]
    fn body_type_round_trips_for_media_kinds() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Audio, MediaKind::File] {
            assert_eq!(MediaKind::from_body_type(kind.body_type()), Some(kind));
        }
        assert_eq!(MediaKind::from_body_type("STICKER"), None);
    }

    #[test]
    fn inbound_event_reports_msgtype() {
        let evt = InboundEvent {
            conversation_id: "!room:example.org".into(),
            event_id: "$1".into(),
            sender_id: "@alice:example.org".into(),
            timestamp: 0,
            event_type: "m.room.message".into(),
            body: "here".into(),
            content: EventContent::Location {
                geo_uri: "geo:1,2".into(),
            },
        };
        assert_eq!(evt.msgtype(), "m.location");
    }
}
