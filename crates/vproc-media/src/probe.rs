//! Probe output parsing.

use serde::Deserialize;

use crate::error::{MediaError, MediaResult};

/// Metadata extracted from probe output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeMetadata {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Parse `-print_format json -show_format -show_streams` output.
///
/// Duration comes from the container, falling back to the video stream.
/// Width and height come from the first video stream.
pub fn parse_probe_output(output: &[u8]) -> MediaResult<ProbeMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(output)
        .map_err(|e| MediaError::metadata_parse(format!("invalid probe output: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::metadata_parse("no video stream in probe output"))?;

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::metadata_parse("duration missing from probe output"))?;

    let width = video
        .width
        .ok_or_else(|| MediaError::metadata_parse("width missing from probe output"))?;
    let height = video
        .height
        .ok_or_else(|| MediaError::metadata_parse("height missing from probe output"))?;

    Ok(ProbeMetadata {
        duration,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "aac"},
            {"index": 1, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080}
        ],
        "format": {"filename": "in.mp4", "duration": "12.480000", "size": "1048576"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let meta = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert!((meta.duration - 12.48).abs() < 1e-9);
        assert_eq!((meta.width, meta.height), (1920, 1080));
    }

    #[test]
    fn test_stream_duration_fallback() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":480,"duration":"3.5"}],"format":{}}"#;
        let meta = parse_probe_output(json.as_bytes()).unwrap();
        assert!((meta.duration - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_are_parse_errors() {
        let no_video = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"1.0"}}"#;
        assert!(matches!(
            parse_probe_output(no_video.as_bytes()),
            Err(MediaError::MetadataParse(_))
        ));

        let no_duration = r#"{"streams":[{"codec_type":"video","width":1,"height":1}]}"#;
        assert!(matches!(
            parse_probe_output(no_duration.as_bytes()),
            Err(MediaError::MetadataParse(_))
        ));

        assert!(matches!(parse_probe_output(b""), Err(MediaError::MetadataParse(_))));
    }
}
