//! Language tag to font source mapping.

use std::collections::BTreeMap;

const NOTO_BASE_URL: &str = "https://github.com/googlefonts/noto-fonts/raw/main/hinted/ttf";

/// Where a language's font lives: cache file name and download URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontSource {
    pub file_name: String,
    pub url: String,
}

impl FontSource {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }

    /// Regular weight of a hinted Noto Sans family, e.g. `Devanagari`.
    pub fn noto_sans(script: &str) -> Self {
        let family = format!("NotoSans{}", script);
        Self::new(
            format!("{}-Regular.ttf", family),
            format!("{}/{}/{}-Regular.ttf", NOTO_BASE_URL, family, family),
        )
    }
}

/// Immutable language table handed to the resolver at construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FontTable {
    entries: BTreeMap<String, FontSource>,
}

impl FontTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the source for a language tag.
    pub fn with(mut self, language: &str, source: FontSource) -> Self {
        self.entries.insert(normalize_language(language), source);
        self
    }

    /// Indic scripts served from the Noto project.
    pub fn indic() -> Self {
        Self::new()
            .with("hi", FontSource::noto_sans("Devanagari"))
            .with("mr", FontSource::noto_sans("Devanagari"))
            .with("ta", FontSource::noto_sans("Tamil"))
            .with("te", FontSource::noto_sans("Telugu"))
            .with("bn", FontSource::noto_sans("Bengali"))
            .with("gu", FontSource::noto_sans("Gujarati"))
            .with("kn", FontSource::noto_sans("Kannada"))
            .with("ml", FontSource::noto_sans("Malayalam"))
            .with("pa", FontSource::noto_sans("Gurmukhi"))
    }

    pub fn get(&self, language: &str) -> Option<&FontSource> {
        self.entries.get(&normalize_language(language))
    }

    /// Sources deduplicated by cache file name.
    pub fn distinct_sources(&self) -> Vec<&FontSource> {
        let mut seen = BTreeMap::new();
        for source in self.entries.values() {
            seen.entry(source.file_name.as_str()).or_insert(source);
        }
        seen.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn normalize_language(language: &str) -> String {
    language.trim().to_ascii_lowercase()
}
