// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media pipeline: moves attachment bytes through the room transport and
//! extracts whatever metadata can be read cheaply.

use std::io::Cursor;
use std::sync::Arc;

use talkrelay_core::{MediaDescriptor, MediaKind, MediaPayload, RelayError, RoomTransport};
use tracing::debug;

const OCTET_STREAM: &str = "application/octet-stream";

/// Metadata read from raw attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Determine MIME type and pixel dimensions.
///
/// MIME resolution order: the declared type, the sniffed image format,
/// the filename extension, then `application/octet-stream`. Dimensions are
/// only read from image headers; the pixels are never decoded.
pub fn inspect(bytes: &[u8], filename: Option<&str>, declared: Option<&str>) -> MediaInfo {
    let sniffed = image::guess_format(bytes).ok();
    let mime_type = declared
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .or_else(|| sniffed.map(|f| f.to_mime_type().to_string()))
        .or_else(|| filename.and_then(|n| mime_guess::from_path(n).first_raw().map(str::to_string)))
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    let dimensions = sniffed.and_then(|format| {
        image::ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .ok()
    });

    MediaInfo {
        mime_type,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
    }
}

/// A filename for attachments the remote backend sent without one.
pub fn default_filename(kind: MediaKind, mime_type: &str) -> String {
    let stem = match kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::File => "file",
    };
    match mime_guess::get_mime_extensions_str(mime_type).and_then(|exts| exts.first()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Resolves attachments against the room transport's media repository.
#[derive(Clone)]
pub struct MediaPipeline {
    room: Arc<dyn RoomTransport>,
}

impl MediaPipeline {
    pub fn new(room: Arc<dyn RoomTransport>) -> Self {
        Self { room }
    }

    /// Fetch the bytes behind a room-side media reference.
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>, RelayError> {
        let bytes = self.room.download_media(uri).await?;
        debug!(uri, size = bytes.len(), "downloaded media");
        Ok(bytes)
    }

    /// Turn a remote attachment into a room-hosted [`MediaDescriptor`].
    ///
    /// Inline bytes are uploaded. A hosted URI is downloaded for metadata
    /// only and reused as-is.
    pub async fn resolve(
        &self,
        kind: MediaKind,
        payload: &MediaPayload,
        filename: Option<&str>,
        declared_mime: Option<&str>,
    ) -> Result<MediaDescriptor, RelayError> {
        let (uri, bytes) = match payload {
            MediaPayload::Unresolved(reason) => {
                return Err(RelayError::ContentBuild(format!(
                    "{} attachment unusable: {reason}",
                    kind.body_type()
                )));
            }
            MediaPayload::Hosted(uri) => (Some(uri.clone()), self.download(uri).await?),
            MediaPayload::Inline(bytes) => (None, bytes.clone()),
        };

        let info = inspect(&bytes, filename, declared_mime);
        let size = bytes.len();
        let uri = match uri {
            Some(uri) => uri,
            None => {
                let uri = self.room.upload_media(bytes, &info.mime_type).await?;
                debug!(uri, size, mime_type = info.mime_type, "uploaded media");
                uri
            }
        };

        // `image` cannot read video containers; only stills get dimensions.
        let (width, height) = match kind {
            MediaKind::Image => (info.width, info.height),
            MediaKind::Video | MediaKind::Audio | MediaKind::File => (None, None),
        };

        Ok(MediaDescriptor {
            uri,
            filename: filename
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| default_filename(kind, &info.mime_type)),
            mime_type: info.mime_type,
            width,
            height,
            duration: None,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG.
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn inspect_sniffs_png_and_reads_dimensions() {
        let info = inspect(PNG, None, None);
        assert_eq!(info.mime_type, "image/png");
        assert_eq!((info.width, info.height), (Some(1), Some(1)));
    }

    #[test]
    fn declared_mime_wins_over_sniffing() {
        let info = inspect(PNG, Some("x.bin"), Some("image/x-custom"));
        assert_eq!(info.mime_type, "image/x-custom");
    }

    #[test]
    fn unknown_bytes_fall_back_to_extension_then_octet_stream() {
        assert_eq!(inspect(b"%PDF-1.7", Some("doc.pdf"), None).mime_type, "application/pdf");
        let info = inspect(b"\x00\x01", None, None);
        assert_eq!(info.mime_type, OCTET_STREAM);
        assert_eq!(info.width, None);
    }

    #[test]
    fn default_filename_uses_mime_extension() {
        let name = default_filename(MediaKind::Image, "image/png");
        assert_eq!(name, "image.png");
        assert_eq!(default_filename(MediaKind::File, "application/x-unknown-thing"), "file");
    }
    #[tokio::test]
    async fn only_images_carry_dimensions() {
        let room = Arc::new(talkrelay_test_utils::MockRoom::new("@relay:x"));
        let pipeline = MediaPipeline::new(room);
        let payload = MediaPayload::Inline(PNG.to_vec());

        let image = pipeline
            .resolve(MediaKind::Image, &payload, None, None)
            .await
            .unwrap();
        assert_eq!((image.width, image.height), (Some(1), Some(1)));

        let video = pipeline
            .resolve(MediaKind::Video, &payload, Some("clip.mp4"), Some("video/mp4"))
            .await
            .unwrap();
        assert_eq!((video.width, video.height, video.duration), (None, None, None));
    }
}
