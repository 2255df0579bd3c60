// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the remote backend's JSON API.
//!
//! These types map 1:1 to the backend's request/response JSON. They are
//! separate from the `talkrelay-core` model; conversions live at the bottom.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use talkrelay_core::{
    ActionHint, ConversationId, DeliveryRecord, MediaKind, MediaPayload, OutboundWireMessage,
    RemoteBody, RemoteId, RemoteMessage, WireMedia, WirePayload,
};

// --- receiveMessage ---

/// Request body for `POST receiveMessage`.
///
/// Absent fields serialize as `null`; the backend expects every key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessageRequest<'a> {
    pub timestamp: i64,
    pub room_id: &'a str,
    pub event_id: &'a str,
    pub sender_id: &'a str,
    pub event_type: &'a str,
    pub body: &'a str,
    pub message_type: &'a str,
    pub format: Option<&'a str>,
    pub formatted_body: Option<&'a str>,
    pub geo_uri: Option<&'a str>,
    pub mime_type: Option<&'a str>,
    pub mxc_uri: Option<&'a str>,
    /// Base64-encoded attachment bytes.
    pub bytes: Option<String>,
}

impl<'a> From<&'a OutboundWireMessage> for ReceiveMessageRequest<'a> {
    fn from(msg: &'a OutboundWireMessage) -> Self {
        let mut request = Self {
            timestamp: msg.timestamp,
            room_id: msg.conversation_id.as_str(),
            event_id: msg.event_id.as_str(),
            sender_id: &msg.sender_id,
            event_type: &msg.event_type,
            body: &msg.body,
            message_type: &msg.message_type,
            format: None,
            formatted_body: None,
            geo_uri: None,
            mime_type: None,
            mxc_uri: None,
            bytes: None,
        };
        match &msg.payload {
            WirePayload::Text {
                format,
                formatted_body,
            } => {
                request.format = format.as_deref();
                request.formatted_body = formatted_body.as_deref();
            }
            WirePayload::Location { geo_uri } => request.geo_uri = Some(geo_uri),
            WirePayload::Media(WireMedia::Inline { mime_type, bytes }) => {
                request.mime_type = mime_type.as_deref();
                request.bytes = Some(STANDARD.encode(bytes));
            }
            WirePayload::Media(WireMedia::Hosted { mime_type, uri }) => {
                request.mime_type = mime_type.as_deref();
                request.mxc_uri = Some(uri);
            }
            WirePayload::Bare => {}
        }
        request
    }
}

// --- getMessages ---

/// Response body for `GET getMessages`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetMessagesResponse {
    #[serde(default)]
    pub messages: Vec<WireRemoteMessage>,
}

/// Backend ids arrive as either JSON strings or numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// A single pending message as returned by `getMessages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRemoteMessage {
    pub id: WireId,
    pub room_id: String,
    pub body_type: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub mxc_uri: Option<String>,
    /// Action key to label, in the order the backend sent them.
    #[serde(default)]
    pub actions: Option<Map<String, Value>>,
}

impl From<WireRemoteMessage> for RemoteMessage {
    fn from(wire: WireRemoteMessage) -> Self {
        let body = match wire.body_type.as_str() {
            "TEXT" => RemoteBody::Text(wire.body.unwrap_or_default()),
            "HTML" => RemoteBody::Html(wire.body.unwrap_or_default()),
            "GEO_URI" => RemoteBody::GeoUri(wire.body.unwrap_or_default()),
            "DELETE_MESSAGE" => RemoteBody::Delete {
                target: wire.body.unwrap_or_default(),
            },
            other => match MediaKind::from_body_type(other) {
                Some(kind) => RemoteBody::Media {
                    kind,
                    payload: media_payload(wire.mxc_uri, wire.body.as_deref()),
                    filename: wire.filename,
                    mime_type: wire.mime_type,
                },
                None => RemoteBody::Unsupported {
                    body_type: other.to_string(),
                },
            },
        };

        let action_hints = wire
            .actions
            .unwrap_or_default()
            .into_iter()
            .map(|(key, text)| ActionHint {
                key,
                text: match text {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect();

        RemoteMessage {
            remote_id: RemoteId(wire.id.into_string()),
            conversation_id: ConversationId(wire.room_id),
            body,
            action_hints,
        }
    }
}

/// A hosted URI wins over inline bytes so an attachment is never uploaded twice.
fn media_payload(mxc_uri: Option<String>, body: Option<&str>) -> MediaPayload {
    if let Some(uri) = mxc_uri.filter(|u| !u.is_empty()) {
        return MediaPayload::Hosted(uri);
    }
    match body.map(str::trim) {
        None | Some("") => MediaPayload::Unresolved("empty body".to_string()),
        Some(encoded) => match STANDARD.decode(encoded) {
            Ok(bytes) => MediaPayload::Inline(bytes),
            Err(e) => MediaPayload::Unresolved(format!("invalid base64 payload: {e}")),
        },
    }
}

// --- confirmMessages ---

/// Request body for `POST confirmMessages`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmMessagesRequest {
    pub messages: Vec<ConfirmedMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedMessage {
    pub source_id: String,
    pub matrix_id: Option<String>,
    pub mxc_uri: Option<String>,
}

impl From<&[DeliveryRecord]> for ConfirmMessagesRequest {
    fn from(records: &[DeliveryRecord]) -> Self {
        Self {
            messages: records
                .iter()
                .map(|r| ConfirmedMessage {
                    source_id: r.remote_id.0.clone(),
                    matrix_id: r.room_event_id.as_ref().map(|e| e.0.clone()),
                    mxc_uri: r.media_uri.clone(),
                })
                .collect(),
        }
    }
}

// --- tagRoom ---

/// Request body for `POST tagRoom`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRoomRequest<'a> {
    pub room_id: &'a str,
    pub tag: &'a str,
    pub value: &'a str,
}

/// Error body returned with any non-200 status.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub description: Option<String>,
}
