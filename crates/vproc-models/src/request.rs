//! Operation requests accepted by the dispatcher.
//!
//! Each request carries its own `validate()`; only shape and range checks
//! happen here. Checks that touch the filesystem or storage are left to
//! the dispatcher.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::{JobKind, MediaId, OverlayKind, Quality};

/// Placeholder value API clients send when they leave a path field untouched.
pub const PLACEHOLDER_PATH: &str = "string";

/// Minimum watermark opacity.
pub const MIN_OPACITY: f64 = 0.1;
/// Maximum watermark opacity.
pub const MAX_OPACITY: f64 = 1.0;

/// A rejected request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// A request for one operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRequest {
    ProbeAndIngest(IngestRequest),
    Trim(TrimRequest),
    Overlay(OverlayRequest),
    Watermark(WatermarkRequest),
    QualityConvert(QualityRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::ProbeAndIngest(_) => JobKind::ProbeAndIngest,
            JobRequest::Trim(_) => JobKind::Trim,
            JobRequest::Overlay(_) => JobKind::Overlay,
            JobRequest::Watermark(_) => JobKind::Watermark,
            JobRequest::QualityConvert(_) => JobKind::QualityConvert,
        }
    }

    /// Source media the request operates on. Ingest has none.
    pub fn media_id(&self) -> Option<&MediaId> {
        match self {
            JobRequest::ProbeAndIngest(_) => None,
            JobRequest::Trim(r) => Some(&r.media_id),
            JobRequest::Overlay(r) => Some(&r.media_id),
            JobRequest::Watermark(r) => Some(&r.media_id),
            JobRequest::QualityConvert(r) => Some(&r.media_id),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        match self {
            JobRequest::ProbeAndIngest(r) => r.validate(),
            JobRequest::Trim(r) => r.validate(),
            JobRequest::Overlay(r) => r.validate(),
            JobRequest::Watermark(r) => r.validate(),
            JobRequest::QualityConvert(r) => r.validate(),
        }
    }
}

/// Ingest a file the upload layer already wrote to disk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestRequest {
    pub source_path: PathBuf,
    pub original_filename: String,
}

impl IngestRequest {
    pub fn validate(&self) -> ValidationResult {
        let name = self.original_filename.trim();
        if name.is_empty() {
            return Err(ValidationError::new("original_filename", "Filename is required"));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ValidationError::new(
                "original_filename",
                "Filename must not contain path separators",
            ));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(ValidationError::new("source_path", "Source path is required"));
        }
        Ok(())
    }
}

/// Cut `[start_time, end_time)` out of a media file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrimRequest {
    pub media_id: MediaId,
    pub start_time: f64,
    pub end_time: f64,
}

impl TrimRequest {
    pub fn validate(&self) -> ValidationResult {
        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(ValidationError::new("start_time", "Times must be finite numbers"));
        }
        if self.start_time < 0.0 {
            return Err(ValidationError::new("start_time", "Start time must be positive"));
        }
        if self.end_time <= self.start_time {
            return Err(ValidationError::new(
                "end_time",
                "End time must be greater than start time",
            ));
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Draw text or an image over a media file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OverlayRequest {
    pub media_id: MediaId,
    /// TEXT or IMAGE
    pub overlay_type: String,
    /// Text to draw, or path of the image to overlay
    pub content: String,
    #[serde(default)]
    pub position_x: i32,
    #[serde(default)]
    pub position_y: i32,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_font_size() -> u32 {
    24
}

fn default_font_color() -> String {
    "white".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl OverlayRequest {
    /// Build a text overlay with default placement and styling.
    pub fn text(
        media_id: MediaId,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            media_id,
            overlay_type: "TEXT".to_string(),
            content: content.into(),
            position_x: 0,
            position_y: 0,
            start_time: 0.0,
            end_time: None,
            font_size: default_font_size(),
            font_color: default_font_color(),
            language: language.into(),
        }
    }

    /// Parsed overlay kind. Only TEXT and IMAGE are accepted here;
    /// watermarks have their own request.
    pub fn kind(&self) -> Result<OverlayKind, ValidationError> {
        match self.overlay_type.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(OverlayKind::Text),
            "IMAGE" => Ok(OverlayKind::Image),
            other => Err(ValidationError::new(
                "overlay_type",
                format!("Overlay type must be TEXT or IMAGE (got '{}')", other),
            )),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        self.kind()?;
        if self.content.trim().is_empty() {
            return Err(ValidationError::new("content", "Content is required"));
        }
        if self.font_size == 0 {
            return Err(ValidationError::new("font_size", "Font size must be positive"));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(ValidationError::new("start_time", "Start time must be positive"));
        }
        if let Some(end) = self.end_time {
            if !end.is_finite() || end <= self.start_time {
                return Err(ValidationError::new(
                    "end_time",
                    "End time must be greater than start time",
                ));
            }
        }
        Ok(())
    }
}

/// Blend a watermark image at a named anchor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WatermarkRequest {
    pub media_id: MediaId,
    pub watermark_path: PathBuf,
    #[serde(default = "default_watermark_offset")]
    pub position_x: i32,
    #[serde(default = "default_watermark_offset")]
    pub position_y: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Named anchor: top-left, top-right, bottom-left, bottom-right, center
    #[serde(default = "default_anchor")]
    pub position: String,
}

fn default_watermark_offset() -> i32 {
    10
}

fn default_opacity() -> f64 {
    0.7
}

fn default_anchor() -> String {
    "top-right".to_string()
}

impl WatermarkRequest {
    pub fn new(media_id: MediaId, watermark_path: impl Into<PathBuf>) -> Self {
        Self {
            media_id,
            watermark_path: watermark_path.into(),
            position_x: default_watermark_offset(),
            position_y: default_watermark_offset(),
            opacity: default_opacity(),
            position: default_anchor(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let path = self.watermark_path.to_string_lossy();
        if path.trim().is_empty() || path.trim() == PLACEHOLDER_PATH {
            return Err(ValidationError::new(
                "watermark_path",
                "Invalid watermark path. Please provide a valid path to an image file (PNG, JPG, etc.)",
            ));
        }
        if !(MIN_OPACITY..=MAX_OPACITY).contains(&self.opacity) {
            return Err(ValidationError::new(
                "opacity",
                "Opacity must be between 0.1 and 1.0",
            ));
        }
        Ok(())
    }
}

/// Transcode a media file into fixed resolutions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityRequest {
    pub media_id: MediaId,
    pub qualities: Vec<String>,
}

impl QualityRequest {
    /// Parse the requested tags, dropping repeats but keeping first-seen order.
    pub fn parsed_qualities(&self) -> Result<Vec<Quality>, ValidationError> {
        if self.qualities.is_empty() {
            return Err(ValidationError::new(
                "qualities",
                "At least one quality must be specified",
            ));
        }
        let mut parsed: Vec<Quality> = Vec::with_capacity(self.qualities.len());
        for tag in &self.qualities {
            let quality: Quality = tag.parse()?;
            if !parsed.contains(&quality) {
                parsed.push(quality);
            }
        }
        Ok(parsed)
    }

    pub fn validate(&self) -> ValidationResult {
        self.parsed_qualities().map(|_| ())
    }
}
