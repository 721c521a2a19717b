//! Attachments moved between the gateway and the helpdesk

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the bytes of a media item come from
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// Downloadable URL (helpdesk attachments)
    Url(String),
    /// Media id known to the WhatsApp gateway
    Gateway { media_id: String },
    /// Bytes already in memory
    Bytes(Vec<u8>),
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Gateway { media_id } => f
                .debug_struct("Gateway")
                .field("media_id", media_id)
                .finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// Coarse media category, which decides the send call on the WhatsApp side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
}

impl MediaKind {
    /// Classify by MIME type, falling back to the file extension
    pub fn detect(mime_type: &str, file_name: &str) -> Self {
        let base = mime_type
            .split(';')
            .next()
            .unwrap_or(mime_type)
            .trim()
            .to_lowercase();

        match base.split('/').next() {
            Some("image") if base != "image/svg+xml" => return Self::Image,
            Some("audio") => return Self::Audio,
            Some("video") => return Self::Video,
            _ => {},
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "gif" => Self::Image,
            "ogg" | "opus" | "mp3" | "m4a" | "aac" | "wav" | "oga" => Self::Audio,
            "mp4" | "3gp" | "mov" => Self::Video,
            _ => Self::Document,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attachment to move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub source: MediaSource,
    pub file_name: String,
    pub mime_type: String,
    pub size_hint: Option<u64>,
    /// Text sent together with the media
    pub caption: Option<String>,
}

impl MediaItem {
    pub fn new(source: MediaSource, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            source,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_hint: None,
            caption: None,
        }
    }

    /// Item backed by a gateway media id
    pub fn from_gateway(
        media_id: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::new(
            MediaSource::Gateway {
                media_id: media_id.into(),
            },
            file_name,
            mime_type,
        )
    }

    /// Item backed by a downloadable URL
    pub fn from_url(
        url: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::new(MediaSource::Url(url.into()), file_name, mime_type)
    }

    #[must_use]
    pub const fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        self.caption = (!caption.trim().is_empty()).then_some(caption);
        self
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::detect(&self.mime_type, &self.file_name)
    }

    /// Short human-readable identity used in logs and error reports
    pub fn describe(&self) -> String {
        match &self.source {
            MediaSource::Url(url) => format!("{} ({url})", self.file_name),
            MediaSource::Gateway { media_id } => format!("{} (media {media_id})", self.file_name),
            MediaSource::Bytes(bytes) => format!("{} ({} bytes)", self.file_name, bytes.len()),
        }
    }
}
