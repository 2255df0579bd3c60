// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts remote messages into room content.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use talkrelay_core::{ActionHint, RelayError, RemoteBody, RemoteMessage, RoomContent};

use crate::media::MediaPipeline;

/// A `<br/>` inside a `<pre>...</pre>` span. Greedy on both sides, so each
/// pass rewrites the last break before the final `</pre>`.
static PRE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<pre>(.*)<br/>(.*)</pre>").expect("static regex")
});

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("static regex"));

/// Newlines become `<br/>`, except inside `<pre>` blocks where they stay literal.
///
/// The rewrite is repeated until nothing changes.
pub fn html_format(text: &str) -> String {
    let mut html = text.replace('\n', "<br/>");
    loop {
        let next = match PRE_BREAK.replace(&html, "<pre>${1}\n${2}</pre>") {
            Cow::Borrowed(_) => return html,
            Cow::Owned(next) => next,
        };
        if next == html {
            return html;
        }
        html = next;
    }
}

/// Plain-text fallback for formatted content: breaks to newlines, tags dropped,
/// basic entities decoded.
pub fn html_to_plain(html: &str) -> String {
    let text = BREAK_TAG.replace_all(html, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Formatted notice built from raw HTML-ish text.
pub fn html_notice(text: &str) -> RoomContent {
    let formatted = html_format(text);
    RoomContent::Notice {
        body: html_to_plain(&formatted),
        formatted_body: Some(formatted),
    }
}

/// The options block sent after a message that carries action hints.
pub fn hints_content(actions: &[ActionHint]) -> RoomContent {
    let mut text = String::from("<b>Options</b>:");
    for hint in actions {
        text.push_str(&format!("\n<b>{}</b> : {}", hint.key, hint.text));
    }
    html_notice(&text)
}

/// Builds room content for the deliverable remote body types.
#[derive(Clone)]
pub struct InboundBuilder {
    media: MediaPipeline,
}

impl InboundBuilder {
    pub fn new(media: MediaPipeline) -> Self {
        Self { media }
    }

    /// Deletions and unsupported types are handled by the caller and yield
    /// [`RelayError::ContentBuild`] here, as does a text, HTML or geo message
    /// with a blank body.
    pub async fn build(&self, message: &RemoteMessage) -> Result<RoomContent, RelayError> {
        if let RemoteBody::Text(body) | RemoteBody::Html(body) | RemoteBody::GeoUri(body) =
            &message.body
        {
            if body.trim().is_empty() {
                return Err(RelayError::ContentBuild(format!(
                    "{} message has an empty body",
                    message.body_type()
                )));
            }
        }
        match &message.body {
            RemoteBody::Text(text) => Ok(RoomContent::plain(text.as_str())),
            RemoteBody::Html(html) => Ok(html_notice(html)),
            RemoteBody::GeoUri(geo_uri) => Ok(RoomContent::Location {
                body: geo_uri.clone(),
                geo_uri: geo_uri.clone(),
            }),
            RemoteBody::Media {
                kind,
                payload,
                filename,
                mime_type,
            } => {
                let descriptor = self
                    .media
                    .resolve(*kind, payload, filename.as_deref(), mime_type.as_deref())
                    .await?;
                Ok(RoomContent::Media {
                    kind: *kind,
                    descriptor,
                })
            }
            RemoteBody::Delete { .. } | RemoteBody::Unsupported { .. } => Err(
                RelayError::ContentBuild(format!("{} has no room content", message.body_type())),
            ),
        }
    }
}
