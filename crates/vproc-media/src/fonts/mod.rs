//! Font resolution for text overlays.
//!
//! A language tag resolves, in order, to:
//! 1. the cached font file for that language, if present
//! 2. a freshly downloaded copy (bounded retries with linear backoff)
//! 3. the first existing file in the [`FallbackChain`]
//! 4. `None`, meaning the external tool should use its own default
//!
//! Resolution never fails. Concurrent first-time downloads of the same
//! file may both run; each writes a private temp file and renames it into
//! place, so the cache never holds a partial font.

mod download;
mod fallback;
mod table;

pub use download::FontDownloader;
pub use fallback::FallbackChain;
pub use table::{FontSource, FontTable};

use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::MediaResult;

/// Font cache and download settings.
#[derive(Debug, Clone)]
pub struct FontResolverConfig {
    /// Cache directory
    pub fonts_dir: PathBuf,
    /// Download attempts per font
    pub download_attempts: u32,
    /// Linear backoff base between attempts
    pub retry_base: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for FontResolverConfig {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("./fonts"),
            download_attempts: 3,
            retry_base: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of pre-warming the font cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    /// Distinct font files present after warm-up
    pub available: usize,
    /// Distinct font files in the table
    pub total: usize,
}

/// Maps language tags to usable font files.
#[derive(Debug, Clone)]
pub struct FontResolver {
    fonts_dir: PathBuf,
    table: FontTable,
    fallback: FallbackChain,
    downloader: FontDownloader,
}

impl FontResolver {
    pub fn new(
        config: FontResolverConfig,
        table: FontTable,
        fallback: FallbackChain,
    ) -> MediaResult<Self> {
        let fonts_dir = if config.fonts_dir.is_absolute() {
            config.fonts_dir
        } else {
            std::env::current_dir()?.join(config.fonts_dir)
        };
        let downloader = FontDownloader::new(
            config.connect_timeout,
            config.request_timeout,
            config.download_attempts,
            config.retry_base,
        )?;

        Ok(Self {
            fonts_dir,
            table,
            fallback,
            downloader,
        })
    }

    pub fn fonts_dir(&self) -> &Path {
        &self.fonts_dir
    }

    /// Resolve a font for `language`, downloading it on a cache miss.
    pub async fn resolve(&self, language: &str) -> Option<PathBuf> {
        let Some(source) = self.table.get(language) else {
            debug!(language, "No font configured for language, using default");
            return self.fallback.resolve_generic();
        };

        let cached = self.cache_path(source);
        if is_cached(&cached).await {
            return Some(cached);
        }

        info!(language, file = %source.file_name, "Font not cached, downloading");
        match self.downloader.fetch(&source.url, &cached).await {
            Ok(_) => Some(cached),
            Err(e) => {
                warn!(language, error = %e, "Font download failed, using fallback");
                self.fallback.resolve(language)
            }
        }
    }

    /// Resolve without touching the network.
    pub async fn lookup(&self, language: &str) -> Option<PathBuf> {
        let Some(source) = self.table.get(language) else {
            return self.fallback.resolve_generic();
        };
        let cached = self.cache_path(source);
        if is_cached(&cached).await {
            Some(cached)
        } else {
            self.fallback.resolve(language)
        }
    }

    /// Whether a usable font file exists for `language` right now.
    pub async fn is_font_available(&self, language: &str) -> bool {
        match self.lookup(language).await {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Download every missing font in the table.
    ///
    /// Best-effort: failures are logged and counted, never returned.
    pub async fn warm_cache(&self) -> WarmupReport {
        let sources = self.table.distinct_sources();
        let total = sources.len();

        if let Err(e) = tokio::fs::create_dir_all(&self.fonts_dir).await {
            warn!(dir = %self.fonts_dir.display(), error = %e, "Cannot create font directory");
            return WarmupReport {
                available: 0,
                total,
            };
        }
        info!(dir = %self.fonts_dir.display(), "Initializing fonts");

        let results = join_all(sources.into_iter().map(|source| async move {
            let path = self.cache_path(source);
            if is_cached(&path).await {
                debug!(file = %source.file_name, "Font already cached");
                return true;
            }
            match self.downloader.fetch(&source.url, &path).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(file = %source.file_name, error = %e, "Font unavailable, will use fallback");
                    false
                }
            }
        }))
        .await;

        let available = results.into_iter().filter(|ok| *ok).count();
        info!(available, total, "Font initialization completed");
        if available == 0 && total > 0 {
            warn!("No custom fonts available, relying on fallback fonts");
        }

        WarmupReport { available, total }
    }

    fn cache_path(&self, source: &FontSource) -> PathBuf {
        self.fonts_dir.join(&source.file_name)
    }
}

async fn is_cached(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &Path) -> FontResolverConfig {
        FontResolverConfig {
            fonts_dir: dir.to_path_buf(),
            download_attempts: 3,
            retry_base: Duration::from_millis(1),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn hindi_table(server: &MockServer) -> FontTable {
        FontTable::new().with(
            "hi",
            FontSource::new("hindi.ttf", format!("{}/fonts/hindi.ttf", server.uri())),
        )
    }

    #[tokio::test]
    async fn test_cached_font_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hindi.ttf"), b"cached").unwrap();

        let resolver =
            FontResolver::new(config(dir.path()), hindi_table(&server), FallbackChain::empty())
                .unwrap();

        let first = resolver.resolve("hi").await;
        let second = resolver.resolve("hi").await;
        assert_eq!(first, Some(dir.path().join("hindi.ttf")));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_download_on_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fonts/hindi.ttf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"glyphs".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let resolver =
            FontResolver::new(config(dir.path()), hindi_table(&server), FallbackChain::empty())
                .unwrap();

        let resolved = resolver.resolve("hi").await.unwrap();
        assert_eq!(resolved, dir.path().join("hindi.ttf"));
        assert_eq!(std::fs::read(&resolved).unwrap(), b"glyphs");

        // Second call is served from the cache.
        assert_eq!(resolver.resolve("HI").await, Some(resolved));
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let system_font = dir.path().join("mangal.ttf");
        std::fs::write(&system_font, b"system").unwrap();
        let fallback = FallbackChain::empty().with_language_font("hi", &system_font);

        let resolver =
            FontResolver::new(config(dir.path()), hindi_table(&server), fallback).unwrap();

        assert_eq!(resolver.resolve("hi").await, Some(system_font));
        assert!(!dir.path().join("hindi.ttf").exists());
    }

    #[tokio::test]
    async fn test_exhausted_retries_without_fallback_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let resolver =
            FontResolver::new(config(dir.path()), hindi_table(&server), FallbackChain::empty())
                .unwrap();

        assert_eq!(resolver.resolve("hi").await, None);
        assert!(!resolver.is_font_available("hi").await);
    }

    #[tokio::test]
    async fn test_unknown_language_uses_generic_font() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let generic = dir.path().join("dejavu.ttf");
        std::fs::write(&generic, b"x").unwrap();
        let fallback = FallbackChain::empty().with_generic_font(&generic);

        let resolver =
            FontResolver::new(config(dir.path()), hindi_table(&server), fallback).unwrap();

        assert_eq!(resolver.resolve("en").await, Some(generic.clone()));
        assert_eq!(resolver.resolve("").await, Some(generic));
        assert!(resolver.is_font_available("en").await);
    }

    #[tokio::test]
    async fn test_warm_cache_reports_distinct_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fonts/deva.ttf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"deva".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fonts/tamil.ttf"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let deva = FontSource::new("deva.ttf", format!("{}/fonts/deva.ttf", server.uri()));
        let table = FontTable::new()
            .with("hi", deva.clone())
            .with("mr", deva)
            .with(
                "ta",
                FontSource::new("tamil.ttf", format!("{}/fonts/tamil.ttf", server.uri())),
            );

        let dir = TempDir::new().unwrap();
        let fonts = dir.path().join("fonts");
        let resolver = FontResolver::new(config(&fonts), table, FallbackChain::empty()).unwrap();

        let report = resolver.warm_cache().await;
        assert_eq!(report, WarmupReport { available: 1, total: 2 });
        assert!(resolver.is_font_available("mr").await);
        assert!(!resolver.is_font_available("ta").await);
    }
}
