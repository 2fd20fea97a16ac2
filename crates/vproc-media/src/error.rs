//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Upper bound on captured tool output carried inside an error.
pub const MAX_ERROR_OUTPUT: usize = 4000;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {}: {output}", display_exit_code(.exit_code))]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("{tool} timed out after {}s", .limit.as_secs())]
    Timeout { tool: String, limit: Duration },

    #[error("Metadata parse error: {0}")]
    MetadataParse(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a tool failure error, keeping only the tail of the output.
    pub fn tool_failed(tool: impl Into<String>, exit_code: Option<i32>, output: &str) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            exit_code,
            output: tail(output.trim_end(), MAX_ERROR_OUTPUT).to_string(),
        }
    }

    /// Create a metadata parse error.
    pub fn metadata_parse(message: impl Into<String>) -> Self {
        Self::MetadataParse(message.into())
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Exit code of a failed tool run, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            MediaError::ToolFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn display_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// Last `max` bytes of `s`, cut on a char boundary.
pub(crate) fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failed_message() {
        let err = MediaError::tool_failed("ffmpeg", Some(1), "in.mp4: No such file or directory\n");
        let msg = err.to_string();
        assert!(msg.contains("failed"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("No such file or directory"));
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_tool_failed_truncates_output() {
        let long = "é".repeat(MAX_ERROR_OUTPUT);
        let err = MediaError::tool_failed("ffmpeg", Some(1), &long);
        match err {
            MediaError::ToolFailed { output, .. } => assert!(output.len() <= MAX_ERROR_OUTPUT),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
