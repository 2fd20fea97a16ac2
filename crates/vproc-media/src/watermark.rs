//! Watermark placement.
//!
//! The watermark image is assumed to fit a 200x100 box; anchors place that
//! box 10px from the chosen edges of the base video.

use std::fmt;
use std::str::FromStr;

/// Assumed watermark width in pixels.
pub const WATERMARK_BOX_WIDTH: i64 = 200;
/// Assumed watermark height in pixels.
pub const WATERMARK_BOX_HEIGHT: i64 = 100;
/// Distance from the video edge in pixels.
pub const WATERMARK_MARGIN: i64 = 10;

/// Named watermark anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
            Anchor::Center => "center",
        }
    }

    /// Overlay coordinates as `x:y` for a base video of the given size.
    pub fn position(&self, width: u32, height: u32) -> String {
        let (w, h) = (i64::from(width), i64::from(height));
        let right = w - WATERMARK_BOX_WIDTH - WATERMARK_MARGIN;
        let bottom = h - WATERMARK_BOX_HEIGHT - WATERMARK_MARGIN;
        let (x, y) = match self {
            Anchor::TopLeft => (WATERMARK_MARGIN, WATERMARK_MARGIN),
            Anchor::TopRight => (right, WATERMARK_MARGIN),
            Anchor::BottomLeft => (WATERMARK_MARGIN, bottom),
            Anchor::BottomRight => (right, bottom),
            Anchor::Center => ((w - WATERMARK_BOX_WIDTH) / 2, (h - WATERMARK_BOX_HEIGHT) / 2),
        };
        format!("{}:{}", x, y)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Anchor::TopLeft),
            "top-right" => Ok(Anchor::TopRight),
            "bottom-left" => Ok(Anchor::BottomLeft),
            "bottom-right" => Ok(Anchor::BottomRight),
            "center" => Ok(Anchor::Center),
            _ => Err(()),
        }
    }
}

/// Overlay position for a named anchor.
///
/// Unrecognized anchors fall back to the top-left corner.
pub fn watermark_position(anchor: &str, width: u32, height: u32) -> String {
    anchor
        .parse::<Anchor>()
        .map(|a| a.position(width, height))
        .unwrap_or_else(|_| Anchor::TopLeft.position(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_full_hd() {
        assert_eq!(watermark_position("top-left", 1920, 1080), "10:10");
        assert_eq!(watermark_position("top-right", 1920, 1080), "1710:10");
        assert_eq!(watermark_position("bottom-left", 1920, 1080), "10:970");
        assert_eq!(watermark_position("bottom-right", 1920, 1080), "1710:970");
        assert_eq!(watermark_position("center", 1920, 1080), "860:490");
    }

    #[test]
    fn test_anchor_is_case_insensitive() {
        assert_eq!(watermark_position("TOP-RIGHT", 1280, 720), "1070:10");
    }

    #[test]
    fn test_unknown_anchor_defaults() {
        assert_eq!(watermark_position("mass", 1920, 1080), "10:10");
        assert_eq!(watermark_position("", 640, 480), "10:10");
    }

    #[test]
    fn test_every_anchor_matches_closed_form() {
        for (w, h) in [(640u32, 480u32), (1280, 720), (1921, 1079), (150, 90)] {
            let (wi, hi) = (w as i64, h as i64);
            assert_eq!(Anchor::TopRight.position(w, h), format!("{}:10", wi - 210));
            assert_eq!(Anchor::BottomLeft.position(w, h), format!("10:{}", hi - 110));
            assert_eq!(
                Anchor::BottomRight.position(w, h),
                format!("{}:{}", wi - 210, hi - 110)
            );
            assert_eq!(
                Anchor::Center.position(w, h),
                format!("{}:{}", (wi - 200) / 2, (hi - 100) / 2)
            );
        }
    }
}
