//! Font download over HTTP with retry.

use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{commit, ensure_parent, remove_quietly, temp_sibling};
use crate::retry::{retry_async, RetryConfig};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetches font files into the cache directory.
#[derive(Debug, Clone)]
pub struct FontDownloader {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl FontDownloader {
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
        attempts: u32,
        retry_base: Duration,
    ) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MediaError::internal(format!("failed to build HTTP client: {}", e)))?;

        let retry = RetryConfig::new("font_download")
            .with_max_attempts(attempts)
            .with_base_delay(retry_base);

        Ok(Self { client, retry })
    }

    /// Download `url` to `dest`, retrying with linear backoff.
    ///
    /// Returns the number of bytes written.
    pub async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let result = retry_async(&self.retry, |attempt| async move {
            let outcome = self.fetch_once(url, dest).await;
            if let Err(e) = &outcome {
                warn!(url, attempt, error = %e, "Font download attempt failed");
            }
            outcome
        })
        .await;

        let outcome = if result.is_success() { "success" } else { "failure" };
        metrics::counter!("vproc_font_downloads_total", "outcome" => outcome).increment(1);
        result.into_result()
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("{}: {}", url, e)))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(MediaError::download_failed(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        ensure_parent(dest).await?;
        let tmp = temp_sibling(dest);
        match stream_to_file(response, &tmp).await {
            Ok(bytes) => {
                commit(&tmp, dest).await?;
                debug!(path = %dest.display(), bytes, "Downloaded font");
                Ok(bytes)
            }
            Err(e) => {
                remove_quietly(&tmp).await;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> MediaResult<u64> {
    let mut file = File::create(path).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::download_failed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
