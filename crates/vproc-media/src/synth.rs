//! Argument synthesis for each media operation.
//!
//! Every builder here is pure: given the same inputs it yields the same
//! argument vector. The only external input is the font path handed in by
//! the caller for text overlays.

use std::path::{Path, PathBuf};

use vproc_models::quality::{
    QUALITY_AUDIO_BITRATE, QUALITY_AUDIO_CODEC, QUALITY_CRF, QUALITY_PRESET, QUALITY_VIDEO_CODEC,
};
use vproc_models::{OverlayRequest, Quality};

use crate::command::ToolCommand;
use crate::error::{MediaError, MediaResult};

/// End of the `enable` window when an overlay has a start but no end.
pub const OPEN_ENDED_OVERLAY_END: f64 = 999999.0;

/// Side length the overlay image is scaled to.
pub const IMAGE_OVERLAY_SIZE: u32 = 200;

/// Locations of the two external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Transcode/filter tool
    pub ffmpeg: String,
    /// Probe tool
    pub ffprobe: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl ToolPaths {
    /// Check both tools resolve to an executable.
    pub fn verify(&self) -> MediaResult<()> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            which::which(tool).map_err(|_| MediaError::ToolNotFound { tool: tool.clone() })?;
        }
        Ok(())
    }
}

/// Builds argument vectors for probe, trim, overlay, watermark and
/// quality commands.
#[derive(Debug, Clone, Default)]
pub struct CommandSynthesizer {
    tools: ToolPaths,
}

impl CommandSynthesizer {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    /// Probe a file for container and stream metadata as JSON.
    pub fn probe(&self, input: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(input.to_string_lossy())
    }

    /// Stream-copy `[start, end)` of `input` into `output`.
    ///
    /// Callers validate `end > start >= 0` beforehand.
    pub fn trim(&self, input: &Path, output: &Path, start: f64, end: f64) -> ToolCommand {
        ToolCommand::new(&self.tools.ffmpeg)
            .input(input)
            .arg("-ss")
            .arg(format_seconds(start))
            .arg("-t")
            .arg(format_seconds(end - start))
            .args(["-c", "copy", "-avoid_negative_ts", "make_zero"])
            .output(output)
    }

    /// Draw text over `input` with a single `drawtext` video filter.
    pub fn text_overlay(
        &self,
        input: &Path,
        output: &Path,
        overlay: &OverlayRequest,
        font: Option<&Path>,
    ) -> ToolCommand {
        ToolCommand::new(&self.tools.ffmpeg)
            .input(input)
            .video_filter(drawtext_filter(overlay, font))
            .audio_codec("copy")
            .output(output)
    }

    /// Scale `image` to a square and overlay it at `(x, y)`.
    pub fn image_overlay(
        &self,
        input: &Path,
        image: &Path,
        output: &Path,
        x: i32,
        y: i32,
    ) -> ToolCommand {
        let filter = format!(
            "[1:v]scale={size}:{size}[ov];[0:v][ov]overlay={x}:{y}",
            size = IMAGE_OVERLAY_SIZE,
        );
        ToolCommand::new(&self.tools.ffmpeg)
            .input(input)
            .input(image)
            .filter_complex(filter)
            .audio_codec("copy")
            .output(output)
    }

    /// Blend `watermark` at `position` (an `x:y` pair) with the given opacity.
    pub fn watermark(
        &self,
        input: &Path,
        watermark: &Path,
        output: &Path,
        opacity: f64,
        position: &str,
    ) -> ToolCommand {
        let filter = format!(
            "[1:v]format=rgba,colorchannelmixer=aa={:.2}[wm];[0:v][wm]overlay={}",
            opacity, position
        );
        ToolCommand::new(&self.tools.ffmpeg)
            .input(input)
            .input(watermark)
            .filter_complex(filter)
            .audio_codec("copy")
            .output(output)
    }

    /// Transcode `input` to one fixed resolution.
    pub fn quality(&self, input: &Path, output: &Path, quality: Quality) -> ToolCommand {
        let (width, height) = quality.dimensions();
        ToolCommand::new(&self.tools.ffmpeg)
            .input(input)
            .video_filter(format!("scale={}:{}", width, height))
            .video_codec(QUALITY_VIDEO_CODEC)
            .crf(QUALITY_CRF)
            .preset(QUALITY_PRESET)
            .audio_codec(QUALITY_AUDIO_CODEC)
            .audio_bitrate(QUALITY_AUDIO_BITRATE)
            .output(output)
    }

    /// One independent transcode command per requested rendition.
    pub fn quality_set(&self, input: &Path, targets: &[(Quality, PathBuf)]) -> Vec<ToolCommand> {
        targets
            .iter()
            .map(|(quality, output)| self.quality(input, output, *quality))
            .collect()
    }
}

/// Build the `drawtext` filter expression for a text overlay.
///
/// The `fontfile` clause is emitted only when a font path is supplied.
/// The `enable` window is emitted when the overlay starts after zero or
/// has an explicit end.
pub fn drawtext_filter(overlay: &OverlayRequest, font: Option<&Path>) -> String {
    let mut filter = format!(
        "drawtext=text='{}':x={}:y={}:fontsize={}:fontcolor={}",
        escape_filter_value(&overlay.content),
        overlay.position_x,
        overlay.position_y,
        overlay.font_size,
        overlay.font_color,
    );

    if let Some(font) = font {
        filter.push_str(&format!(
            ":fontfile='{}'",
            escape_filter_value(&font.to_string_lossy())
        ));
    }

    if overlay.start_time > 0.0 || overlay.end_time.is_some() {
        let end = overlay.end_time.unwrap_or(OPEN_ENDED_OVERLAY_END);
        filter.push_str(&format!(
            ":enable='between(t\\,{:.2}\\,{:.2})'",
            overlay.start_time, end
        ));
    }

    filter
}

/// Escape a value embedded in a filter option.
///
/// Backslashes are doubled first so the escapes added for `:` and `'`
/// survive.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Fixed-notation decimal that always carries a fractional part (`10.0`,
/// `2.5`, `0.00001`).
fn format_seconds(seconds: f64) -> String {
    let formatted = seconds.to_string();
    if formatted.contains('.') {
        formatted
    } else {
        format!("{}.0", formatted)
    }
}
