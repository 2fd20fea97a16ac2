//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vproc_media::{FontResolverConfig, ToolPaths};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Source media root
    pub upload_dir: PathBuf,
    /// Derived artifact root
    pub output_dir: PathBuf,
    /// Font cache directory
    pub fonts_dir: PathBuf,
    /// Transcode/filter tool
    pub ffmpeg_path: String,
    /// Probe tool
    pub ffprobe_path: String,
    /// Maximum concurrent job pipelines
    pub max_concurrent_jobs: usize,
    /// Submissions that may wait for a worker slot
    pub queue_capacity: usize,
    /// Wall-clock limit per tool run (unbounded when unset)
    pub tool_timeout: Option<Duration>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Font download attempts
    pub font_download_attempts: u32,
    /// Linear backoff base between font download attempts
    pub font_retry_base: Duration,
    pub font_connect_timeout: Duration,
    pub font_request_timeout: Duration,
    /// Prometheus exporter port (exporter disabled when unset)
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./outputs"),
            fonts_dir: PathBuf::from("./fonts"),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            max_concurrent_jobs: 10,
            queue_capacity: 100,
            tool_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
            font_download_attempts: 3,
            font_retry_base: Duration::from_millis(1000),
            font_connect_timeout: Duration::from_secs(10),
            font_request_timeout: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: env_var("VPROC_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: env_var("VPROC_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            fonts_dir: env_var("VPROC_FONTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.fonts_dir),
            ffmpeg_path: env_var("VPROC_FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env_var("VPROC_FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            queue_capacity: env_parse("WORKER_QUEUE_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.queue_capacity),
            tool_timeout: env_parse("WORKER_TOOL_TIMEOUT_SECS")
                .filter(|s: &u64| *s > 0)
                .map(Duration::from_secs),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            font_download_attempts: env_parse("FONT_DOWNLOAD_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.font_download_attempts),
            font_retry_base: env_parse("FONT_RETRY_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.font_retry_base),
            font_connect_timeout: env_parse("FONT_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.font_connect_timeout),
            font_request_timeout: env_parse("FONT_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.font_request_timeout),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            ffmpeg: self.ffmpeg_path.clone(),
            ffprobe: self.ffprobe_path.clone(),
        }
    }

    pub fn font_config(&self) -> FontResolverConfig {
        FontResolverConfig {
            fonts_dir: self.fonts_dir.clone(),
            download_attempts: self.font_download_attempts,
            retry_base: self.font_retry_base,
            connect_timeout: self.font_connect_timeout,
            request_timeout: self.font_request_timeout,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 10);
        assert_eq!(config.queue_capacity, 100);
        assert!(config.tool_timeout.is_none());
        assert_eq!(config.font_download_attempts, 3);
        assert_eq!(config.tool_paths(), ToolPaths::default());
        assert_eq!(config.font_config().retry_base, Duration::from_secs(1));
    }

    #[test]
    fn test_from_env_overrides() {
        // Keys unique to this test so parallel tests don't interfere.
        std::env::set_var("VPROC_FFMPEG_PATH", "/opt/bin/ffmpeg");
        std::env::set_var("WORKER_TOOL_TIMEOUT_SECS", "90");
        std::env::set_var("METRICS_PORT", "not-a-port");

        let config = WorkerConfig::from_env();
        assert_eq!(config.ffmpeg_path, "/opt/bin/ffmpeg");
        assert_eq!(config.tool_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.metrics_port, None);

        std::env::remove_var("VPROC_FFMPEG_PATH");
        std::env::remove_var("WORKER_TOOL_TIMEOUT_SECS");
        std::env::remove_var("METRICS_PORT");
    }
}
