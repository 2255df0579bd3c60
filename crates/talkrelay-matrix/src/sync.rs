// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync loop and room-message conversion on top of `matrix-sdk`.

use std::time::Duration;

use matrix_sdk::config::SyncSettings;
use matrix_sdk::ruma::events::room::message::OriginalSyncRoomMessageEvent;
use matrix_sdk::ruma::serde::Raw;
use matrix_sdk::{Client, Room};
use serde_json::Value;
use talkrelay_core::{EventContent, InboundEvent, MediaKind, TextKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SYNC_ERROR_BACKOFF: Duration = Duration::from_secs(5);

fn str_field<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Converts one raw `m.room.message` timeline event.
///
/// Redacted events (no `body`) yield `None`. Events from the relay's own
/// identity are kept; the relay's policy needs them.
pub(crate) fn parse_event(room_id: &str, event: &Value) -> Option<InboundEvent> {
    let event_type = str_field(event, "/type")?;
    if event_type != "m.room.message" {
        return None;
    }
    let event_id = str_field(event, "/event_id")?;
    let sender = str_field(event, "/sender")?;
    let content = event.get("content")?;
    let body = str_field(content, "/body")?;
    let msgtype = str_field(content, "/msgtype").unwrap_or("m.text");

    let owned = |p: &str| str_field(content, p).map(str::to_string);
    let text = |kind| EventContent::Text {
        kind,
        format: owned("/format"),
        formatted_body: owned("/formatted_body"),
    };
    let media = |kind| EventContent::Media {
        kind,
        media_ref: owned("/url"),
        mime_type: owned("/info/mimetype"),
    };

    let content = match msgtype {
        "m.text" => text(TextKind::Text),
        "m.notice" => text(TextKind::Notice),
        "m.emote" => text(TextKind::Emote),
        "m.location" => EventContent::Location {
            geo_uri: owned("/geo_uri").unwrap_or_default(),
        },
        "m.image" => media(MediaKind::Image),
        "m.video" => media(MediaKind::Video),
        "m.audio" => media(MediaKind::Audio),
        "m.file" => media(MediaKind::File),
        other => EventContent::Other {
            msgtype: other.to_string(),
        },
    };

    Some(InboundEvent {
        conversation_id: room_id.into(),
        event_id: event_id.into(),
        sender_id: sender.to_string(),
        timestamp: event
            .get("origin_server_ts")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
        event_type: event_type.to_string(),
        body: body.to_string(),
        content,
    })
}

/// Forwards every room message the client syncs into `events`.
///
/// The raw JSON is converted rather than the typed content so unknown
/// msgtypes and their fields survive.
pub fn register_handler(client: &Client, events: mpsc::Sender<InboundEvent>) {
    client.add_event_handler(
        move |raw: Raw<OriginalSyncRoomMessageEvent>, room: Room| {
            let events = events.clone();
            async move {
                let value = match raw.deserialize_as::<Value>() {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(error = %e, "undecodable room message dropped");
                        return;
                    }
                };
                let Some(event) = parse_event(room.room_id().as_str(), &value) else {
                    return;
                };
                if events.send(event).await.is_err() {
                    debug!("event receiver dropped");
                }
            }
        },
    );
}

/// Runs `sync_once` from `settings` until cancelled.
///
/// Failed syncs are retried after a fixed backoff.
pub async fn run_sync_loop(client: Client, mut settings: SyncSettings, cancel: CancellationToken) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.sync_once(settings.clone()) => result,
        };

        match result {
            Ok(response) => settings = settings.token(response.next_batch),
            Err(e) => {
                warn!(error = %e, "matrix sync failed, will retry");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(SYNC_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    debug!("matrix sync loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_all(events: Value) -> Vec<InboundEvent> {
        events
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| parse_event("!r:x", e))
            .collect()
    }

    #[test]
    fn text_event_keeps_format_fields() {
        let events = parse_all(json!([{
            "type": "m.room.message",
            "event_id": "$1",
            "sender": "@alice:x",
            "origin_server_ts": 1700000000000_i64,
            "content": {
                "msgtype": "m.emote",
                "body": "waves",
                "format": "org.matrix.custom.html",
                "formatted_body": "<i>waves</i>"
            }
        }]));

        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.conversation_id.as_str(), "!r:x");
        assert_eq!(ev.timestamp, 1_700_000_000_000);
        assert_eq!(ev.msgtype(), "m.emote");
        assert_eq!(
            ev.content,
            EventContent::Text {
                kind: TextKind::Emote,
                format: Some("org.matrix.custom.html".into()),
                formatted_body: Some("<i>waves</i>".into()),
            }
        );
    }

    #[test]
    fn media_event_carries_url_and_mimetype() {
        let events = parse_all(json!([{
            "type": "m.room.message",
            "event_id": "$2",
            "sender": "@alice:x",
            "content": {
                "msgtype": "m.image",
                "body": "cat.png",
                "url": "mxc://x/cat",
                "info": { "mimetype": "image/png" }
            }
        }]));

        assert_eq!(
            events[0].content,
            EventContent::Media {
                kind: MediaKind::Image,
                media_ref: Some("mxc://x/cat".into()),
                mime_type: Some("image/png".into()),
            }
        );
    }

    #[test]
    fn non_messages_and_redacted_events_are_skipped() {
        let events = parse_all(json!([
            { "type": "m.room.member", "event_id": "$m", "sender": "@a:x", "content": {} },
            { "type": "m.room.message", "event_id": "$gone", "sender": "@a:x", "content": {} },
            {
                "type": "m.room.message",
                "event_id": "$s",
                "sender": "@a:x",
                "content": { "msgtype": "m.sticker.custom", "body": "sticker" }
            }
        ]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].msgtype(), "m.sticker.custom");
    }

    #[test]
    fn events_without_sender_are_skipped() {
        let event = json!({
            "type": "m.room.message",
            "event_id": "$x",
            "content": { "msgtype": "m.text", "body": "hi" }
        });
        assert!(parse_event("!r:x", &event).is_none());
    }
}
