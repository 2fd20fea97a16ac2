//! Fallback fonts used when a language font cannot be fetched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::table::normalize_language;

/// Ordered list of candidate font files, checked for existence at lookup.
///
/// Language-specific candidates are tried before the generic ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackChain {
    per_language: HashMap<String, Vec<PathBuf>>,
    generic: Vec<PathBuf>,
}

impl FallbackChain {
    /// Chain with no candidates; lookups always yield `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_language_font(mut self, language: &str, path: impl Into<PathBuf>) -> Self {
        self.per_language
            .entry(normalize_language(language))
            .or_default()
            .push(path.into());
        self
    }

    pub fn with_generic_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.generic.push(path.into());
        self
    }

    /// System fonts of the platform this binary was built for.
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        const FONTS: &str = "C:/Windows/Fonts";
        let chain = [
            ("hi", "mangal.ttf"),
            ("mr", "mangal.ttf"),
            ("ta", "latha.ttf"),
            ("te", "gautami.ttf"),
            ("bn", "vrinda.ttf"),
            ("gu", "shruti.ttf"),
            ("kn", "tunga.ttf"),
            ("ml", "kartika.ttf"),
            ("pa", "raavi.ttf"),
        ]
        .into_iter()
        .fold(Self::empty(), |chain, (lang, file)| {
            chain.with_language_font(lang, format!("{}/{}", FONTS, file))
        });
        chain
            .with_generic_font(format!("{}/arial.ttf", FONTS))
            .with_generic_font(format!("{}/calibri.ttf", FONTS))
    }

    /// System fonts of the platform this binary was built for.
    #[cfg(target_os = "macos")]
    pub fn platform_default() -> Self {
        Self::empty()
            .with_generic_font("/System/Library/Fonts/Arial.ttf")
            .with_generic_font("/System/Library/Fonts/Supplemental/Arial.ttf")
    }

    /// System fonts of the platform this binary was built for.
    #[cfg(not(any(windows, target_os = "macos")))]
    pub fn platform_default() -> Self {
        Self::empty()
            .with_generic_font("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")
            .with_generic_font("/usr/share/fonts/TTF/DejaVuSans.ttf")
    }

    /// First existing candidate for `language`, else the first existing
    /// generic font.
    pub fn resolve(&self, language: &str) -> Option<PathBuf> {
        self.per_language
            .get(&normalize_language(language))
            .into_iter()
            .flatten()
            .chain(self.generic.iter())
            .find(|p| is_file(p))
            .cloned()
    }

    /// First existing generic font.
    pub fn resolve_generic(&self) -> Option<PathBuf> {
        self.generic.iter().find(|p| is_file(p)).cloned()
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}
