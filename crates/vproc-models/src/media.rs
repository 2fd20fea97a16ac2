//! Media records and the derived artifacts produced from them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{OverlayRequest, Quality, WatermarkRequest};

/// Unique identifier for a stored media file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MediaId(pub String);

impl MediaId {
    /// Generate a new random media ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MediaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored video file plus its probed metadata.
///
/// Immutable once created; derived artifacts reference it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Media {
    pub id: MediaId,
    /// Name under which the file is stored
    pub filename: String,
    /// Name supplied by the uploader
    pub original_filename: String,
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Size in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// A clip cut out of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrimmedClip {
    pub id: String,
    pub media_id: MediaId,
    pub filename: String,
    pub path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

impl TrimmedClip {
    pub fn new(media_id: MediaId, path: PathBuf, start_time: f64, end_time: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_id,
            filename: file_name_of(&path),
            path,
            start_time,
            end_time,
            duration: end_time - start_time,
            created_at: Utc::now(),
        }
    }
}

/// Kind of overlay drawn on a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlayKind {
    Text,
    Image,
    Watermark,
}

/// Record of an overlay applied to a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayRecord {
    pub id: String,
    pub media_id: MediaId,
    pub kind: OverlayKind,
    /// Text, image path or watermark path
    pub content: String,
    pub position_x: i32,
    pub position_y: i32,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Text styling; absent for watermarks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Artifact produced by the overlay job
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl OverlayRecord {
    /// Record for a text or image overlay produced at `path`.
    pub fn from_request(request: &OverlayRequest, kind: OverlayKind, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_id: request.media_id.clone(),
            kind,
            content: request.content.clone(),
            position_x: request.position_x,
            position_y: request.position_y,
            start_time: request.start_time,
            end_time: request.end_time,
            font_size: Some(request.font_size),
            font_color: Some(request.font_color.clone()),
            language: Some(request.language.clone()),
            path,
            created_at: Utc::now(),
        }
    }

    /// Record for a watermark produced at `path`.
    pub fn from_watermark(request: &WatermarkRequest, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_id: request.media_id.clone(),
            kind: OverlayKind::Watermark,
            content: request.watermark_path.to_string_lossy().into_owned(),
            position_x: request.position_x,
            position_y: request.position_y,
            start_time: 0.0,
            end_time: None,
            font_size: None,
            font_color: None,
            language: None,
            path,
            created_at: Utc::now(),
        }
    }
}

/// A transcoded rendition of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QualityVariant {
    pub id: String,
    pub media_id: MediaId,
    pub quality: Quality,
    pub filename: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl QualityVariant {
    pub fn new(media_id: MediaId, quality: Quality, path: PathBuf, size: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_id,
            quality,
            filename: file_name_of(&path),
            path,
            size,
            created_at: Utc::now(),
        }
    }
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_clip_duration() {
        let clip = TrimmedClip::new(
            MediaId::from("m-1"),
            PathBuf::from("outputs/trimmed_x.mp4"),
            2.0,
            7.0,
        );
        assert!((clip.duration - 5.0).abs() < f64::EPSILON);
        assert_eq!(clip.filename, "trimmed_x.mp4");
    }

    #[test]
    fn test_watermark_record_has_no_styling() {
        let request = WatermarkRequest::new(MediaId::from("m"), "logo.png");
        let record = OverlayRecord::from_watermark(&request, PathBuf::from("outputs/w.mp4"));
        assert_eq!(record.kind, OverlayKind::Watermark);
        assert_eq!(record.content, "logo.png");
        assert_eq!((record.position_x, record.position_y), (10, 10));
        assert!(record.font_size.is_none());
    }

    #[test]
    fn test_media_id_transparent_serde() {
        let id = MediaId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
