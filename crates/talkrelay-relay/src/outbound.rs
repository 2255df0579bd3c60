// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts room events into the wire form accepted by the remote backend.

use strum::Display;
use talkrelay_core::{
    EventContent, InboundEvent, OutboundWireMessage, RelayError, WireMedia, WirePayload,
};

use crate::media::MediaPipeline;

/// The chat network a room sender was bridged from, judged by user-id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    Telegram,
    Signal,
    Whatsapp,
    Matrix,
}

impl Network {
    pub fn of(sender_id: &str) -> Self {
        if sender_id.starts_with("@telegram_") {
            Self::Telegram
        } else if sender_id.starts_with("@signal_") {
            Self::Signal
        } else if sender_id.starts_with("@whatsapp_") {
            Self::Whatsapp
        } else {
            Self::Matrix
        }
    }
}

/// Builds [`OutboundWireMessage`]s, fetching attachment bytes when configured to inline them.
#[derive(Clone)]
pub struct OutboundBuilder {
    media: MediaPipeline,
    inline_media: bool,
}

impl OutboundBuilder {
    pub fn new(media: MediaPipeline, inline_media: bool) -> Self {
        Self {
            media,
            inline_media,
        }
    }

    /// Build the wire message for `event`, with `override_body` replacing its text.
    ///
    /// Media without a usable reference yields [`RelayError::ContentBuild`];
    /// callers drop the message rather than retry it.
    pub async fn build(
        &self,
        event: &InboundEvent,
        override_body: Option<&str>,
    ) -> Result<OutboundWireMessage, RelayError> {
        let payload = match &event.content {
            EventContent::Text {
                format,
                formatted_body,
                ..
            } => WirePayload::Text {
                format: format.clone(),
                formatted_body: formatted_body.clone(),
            },
            EventContent::Location { geo_uri } => WirePayload::Location {
                geo_uri: geo_uri.clone(),
            },
            EventContent::Media {
                media_ref,
                mime_type,
                ..
            } => {
                let uri = media_ref
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| {
                        RelayError::ContentBuild(format!(
                            "{} event {} has no media reference",
                            event.msgtype(),
                            event.event_id
                        ))
                    })?;

                if self.inline_media {
                    let bytes = self.media.download(uri).await.map_err(|e| {
                        RelayError::ContentBuild(format!("cannot fetch {uri}: {e}"))
                    })?;
                    WirePayload::Media(WireMedia::Inline {
                        mime_type: mime_type.clone(),
                        bytes,
                    })
                } else {
                    WirePayload::Media(WireMedia::Hosted {
                        mime_type: mime_type.clone(),
                        uri: uri.to_string(),
                    })
                }
            }
            EventContent::Other { .. } => WirePayload::Bare,
        };

        Ok(OutboundWireMessage {
            timestamp: event.timestamp,
            conversation_id: event.conversation_id.clone(),
            event_id: event.event_id.clone(),
            sender_id: event.sender_id.clone(),
            event_type: event.event_type.clone(),
            body: override_body.unwrap_or(&event.body).to_string(),
            message_type: event.msgtype().to_string(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use talkrelay_core::{MediaKind, TextKind};
    use talkrelay_test_utils::{MockRoom, event};

    fn builder(room: Arc<MockRoom>, inline: bool) -> OutboundBuilder {
        OutboundBuilder::new(MediaPipeline::new(room), inline)
    }

    #[test]
    fn network_is_classified_by_prefix() {
        assert_eq!(Network::of("@telegram_123:bridge.org"), Network::Telegram);
        assert_eq!(Network::of("@signal_abc:bridge.org"), Network::Signal);
        assert_eq!(Network::of("@whatsapp_1:bridge.org"), Network::Whatsapp);
        assert_eq!(Network::of("@alice:example.org"), Network::Matrix);
        assert_eq!(Network::Whatsapp.to_string(), "whatsapp");
    }

    #[tokio::test]
    async fn text_event_carries_format_fields_and_override() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let mut ev = event::text("!r:x", "$1", "@alice:x", "hi");
        ev.content = EventContent::Text {
            kind: TextKind::Emote,
            format: Some("org.matrix.custom.html".into()),
            formatted_body: Some("<i>hi</i>".into()),
        };

        let wire = builder(room, true).build(&ev, Some("/start")).await.unwrap();
        assert_eq!(wire.body, "/start");
        assert_eq!(wire.message_type, "m.emote");
        assert_eq!(
            wire.payload,
            WirePayload::Text {
                format: Some("org.matrix.custom.html".into()),
                formatted_body: Some("<i>hi</i>".into()),
            }
        );
    }

    #[tokio::test]
    async fn inline_media_downloads_bytes() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        room.seed_media("mxc://x/cat", b"meow".to_vec()).await;
        let ev = event::media("!r:x", "$2", "@alice:x", MediaKind::Image, Some("mxc://x/cat"));

        let wire = builder(room, true).build(&ev, None).await.unwrap();
        match wire.payload {
            WirePayload::Media(WireMedia::Inline { bytes, .. }) => assert_eq!(bytes, b"meow"),
            other => panic!("expected inline media, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hosted_media_keeps_uri_without_download() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let ev = event::media("!r:x", "$3", "@alice:x", MediaKind::File, Some("mxc://x/doc"));

        let wire = builder(room.clone(), false).build(&ev, None).await.unwrap();
        assert!(matches!(
            wire.payload,
            WirePayload::Media(WireMedia::Hosted { ref uri, .. }) if uri == "mxc://x/doc"
        ));
        assert_eq!(room.download_count().await, 0);
    }

    #[tokio::test]
    async fn media_without_reference_is_not_buildable() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let ev = event::media("!r:x", "$4", "@alice:x", MediaKind::Audio, None);

        let err = builder(room, true).build(&ev, None).await.unwrap_err();
        assert!(matches!(err, RelayError::ContentBuild(_)));
    }

    #[tokio::test]
    async fn missing_remote_media_is_not_buildable() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let ev = event::media("!r:x", "$5", "@alice:x", MediaKind::Video, Some("mxc://x/gone"));

        let err = builder(room, true).build(&ev, None).await.unwrap_err();
        assert!(matches!(err, RelayError::ContentBuild(_)));
    }

    #[tokio::test]
    async fn location_event_carries_geo_uri() {
        let room = Arc::new(MockRoom::new("@relay:x"));
        let mut ev = event::text("!r:x", "$6", "@alice:x", "here");
        ev.content = EventContent::Location {
            geo_uri: "geo:52.1,4.3".into(),
        };

        let wire = builder(room, true).build(&ev, None).await.unwrap();
        assert_eq!(wire.message_type, "m.location");
        assert_eq!(
            wire.payload,
            WirePayload::Location {
                geo_uri: "geo:52.1,4.3".into()
            }
        );
    }
}
