//! Output renditions and the encoder settings they share.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Video codec used for quality renditions
pub const QUALITY_VIDEO_CODEC: &str = "libx264";
/// Constant Rate Factor for quality renditions
pub const QUALITY_CRF: u8 = 23;
/// Encoder preset for quality renditions
pub const QUALITY_PRESET: &str = "medium";
/// Audio codec for quality renditions
pub const QUALITY_AUDIO_CODEC: &str = "aac";
/// Audio bitrate for quality renditions
pub const QUALITY_AUDIO_BITRATE: &str = "128k";

/// Supported output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Quality {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::P480, Quality::P720, Quality::P1080];

    /// Resolution tag, e.g. "720p".
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
        }
    }

    /// Fixed (width, height) for this rendition.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Quality::P480 => (640, 480),
            Quality::P720 => (1280, 720),
            Quality::P1080 => (1920, 1080),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" => Ok(Quality::P480),
            "720p" => Ok(Quality::P720),
            "1080p" => Ok(Quality::P1080),
            other => Err(ValidationError::new(
                "qualities",
                format!("Quality must be 480p, 720p, or 1080p (got '{}')", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        assert_eq!(Quality::P480.dimensions(), (640, 480));
        assert_eq!(Quality::P720.dimensions(), (1280, 720));
        assert_eq!(Quality::P1080.dimensions(), (1920, 1080));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("720p".parse::<Quality>().unwrap(), Quality::P720);
        assert_eq!(" 1080P ".parse::<Quality>().unwrap(), Quality::P1080);
        assert!("4k".parse::<Quality>().is_err());
        assert!("360p".parse::<Quality>().is_err());
    }

    #[test]
    fn test_serde_uses_tag() {
        assert_eq!(serde_json::to_string(&Quality::P480).unwrap(), "\"480p\"");
    }
}
