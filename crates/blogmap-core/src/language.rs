//! URL-based language detection and filtering.
//!
//! Blogs with translations usually mark the locale in the URL: a leading path
//! segment (`/de/blog/...`, `/pt-BR/blog/...`), a `lang=` query parameter, or a
//! language subdomain (`fr.example.com`). Detection only looks at those
//! markers. A URL without one has an *unknown* language; it is never assumed
//! to be English.
//!
//! ## Usage
//!
//! ```rust
//! use blogmap_core::language::{LanguageFilter, detect_language};
//! use url::Url;
//!
//! let url = Url::parse("https://example.com/de/blog/hallo-welt")?;
//! assert_eq!(detect_language(&url), Some("de"));
//!
//! let mut filter = LanguageFilter::new(["en"]);
//! assert!(filter.accepts("https://example.com/en/blog/hello"));
//! assert!(!filter.accepts("https://example.com/de/blog/hallo"));
//! assert!(filter.accepts("https://example.com/blog/no-marker")); // unknown is kept
//! # Ok::<(), url::ParseError>(())
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use url::Url;

/// Language codes recognised in URLs (ISO 639-1).
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "de", "fr", "en", "es", "it", "pt", "nl", "ja", "zh", "ko", "ru", "pl", "sv", "no", "da", "fi",
];

/// Subdomains treated as language markers.
const LANGUAGE_SUBDOMAINS: &[&str] = &["de", "fr", "en"];

/// Detect the content language of a URL from its locale markers.
///
/// Checks, in order: the first path segment (`de` or `de-AT`), the `lang`
/// query parameter, then a `de.`/`fr.`/`en.` subdomain.
#[must_use]
pub fn detect_language(url: &Url) -> Option<&'static str> {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .and_then(language_code);

    from_path
        .or_else(|| {
            url.query_pairs()
                .find(|(key, _)| key.eq_ignore_ascii_case("lang"))
                .and_then(|(_, value)| language_code(&value))
        })
        .or_else(|| language_subdomain(url))
}

/// [`detect_language`] for an unparsed URL; unparseable input is unknown.
#[must_use]
pub fn detect_language_str(url: &str) -> Option<&'static str> {
    Url::parse(url).ok().as_ref().and_then(detect_language)
}

/// Map a locale marker (`de`, `DE`, `pt-BR`, `zh_TW`) to a supported code.
fn language_code(marker: &str) -> Option<&'static str> {
    let lower = marker.to_ascii_lowercase();
    let code = match lower.as_bytes() {
        [_, _] => lower.as_str(),
        [_, _, b'-' | b'_', _, _] => &lower[..2],
        _ => return None,
    };
    SUPPORTED_LANGUAGES.iter().copied().find(|supported| *supported == code)
}

fn language_subdomain(url: &Url) -> Option<&'static str> {
    let host = url.host_str()?;
    let mut labels = host.split('.');
    let first = labels.next()?;
    // Require a registrable domain after the prefix (`de.example.com`, not `de.com`)
    if labels.count() < 2 {
        return None;
    }
    LANGUAGE_SUBDOMAINS
        .iter()
        .copied()
        .find(|code| first.eq_ignore_ascii_case(code))
}

/// Counts of detected languages across a set of posts.
///
/// Posts with an unknown language are not counted. Serializes as a plain
/// `{code: count}` map with codes in alphabetical order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LanguageStats {
    counts: BTreeMap<String, usize>,
}

impl LanguageStats {
    /// Record one post's detected language.
    pub fn record(&mut self, language: Option<&str>) {
        if let Some(code) = language {
            *self.counts.entry(code.to_string()).or_default() += 1;
        }
    }

    /// Number of posts detected as `code`.
    #[must_use]
    pub fn count(&self, code: &str) -> usize {
        self.counts.get(code).copied().unwrap_or(0)
    }

    /// Whether no language was detected at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(code, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(code, count)| (code.as_str(), *count))
    }
}

impl<'a> FromIterator<Option<&'a str>> for LanguageStats {
    fn from_iter<I: IntoIterator<Item = Option<&'a str>>>(iter: I) -> Self {
        let mut stats = Self::default();
        for language in iter {
            stats.record(language);
        }
        stats
    }
}

/// Statistics about language filtering operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterStats {
    /// Total URLs processed
    pub total_processed: usize,
    /// URLs kept (allowed or unknown language)
    pub accepted: usize,
    /// URLs dropped for a disallowed language
    pub rejected: usize,
}

impl FilterStats {
    /// Percentage of processed URLs that were rejected.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn rejection_percentage(&self) -> f64 {
        if self.total_processed == 0 {
            0.0
        } else {
            (self.rejected as f64 / self.total_processed as f64) * 100.0
        }
    }
}

/// Keeps posts whose detected language is in an allowed set.
///
/// Posts with no detectable language are always kept. An empty allowed set
/// keeps everything.
#[derive(Debug, Default)]
pub struct LanguageFilter {
    allowed: HashSet<&'static str>,
    ignored: Vec<String>,
    stats: FilterStats,
}

impl LanguageFilter {
    /// Create a filter allowing `codes`.
    ///
    /// Codes are matched case-insensitively and region suffixes are dropped
    /// (`pt-BR` allows `pt`). Unsupported codes are ignored; see
    /// [`LanguageFilter::ignored_codes`].
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for code in codes {
            let code = code.as_ref().trim();
            match language_code(code) {
                Some(supported) => {
                    filter.allowed.insert(supported);
                },
                None => filter.ignored.push(code.to_string()),
            }
        }
        filter
    }

    /// Whether every URL passes.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Codes given to [`LanguageFilter::new`] that are not supported.
    #[must_use]
    pub fn ignored_codes(&self) -> &[String] {
        &self.ignored
    }

    /// Check a URL, recording the decision in [`LanguageFilter::stats`].
    pub fn accepts(&mut self, url: &str) -> bool {
        self.stats.total_processed += 1;

        let keep = self.is_passthrough()
            || detect_language_str(url).is_none_or(|code| self.allowed.contains(code));

        if keep {
            self.stats.accepted += 1;
        } else {
            self.stats.rejected += 1;
        }
        keep
    }

    /// Filtering statistics so far.
    #[must_use]
    pub const fn stats(&self) -> &FilterStats {
        &self.stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    fn detect(url: &str) -> Option<&'static str> {
        detect_language(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_path_markers() {
        assert_eq!(detect("https://example.com/de/blog/hallo-welt"), Some("de"));
        assert_eq!(detect("https://example.com/FR/blog/bonjour"), Some("fr"));
        assert_eq!(detect("https://example.com/pt-BR/blog/ola"), Some("pt"));
        assert_eq!(detect("https://example.com/zh_TW/news/x"), Some("zh"));
        assert_eq!(detect("https://example.com/en/blog/hello"), Some("en"));
    }

    #[test]
    fn test_only_first_segment_counts() {
        assert_eq!(detect("https://example.com/blog/de/post"), None);
        // Two-letter segments outside the supported set
        assert_eq!(detect("https://example.com/tr/blog/post"), None);
        assert_eq!(detect("https://example.com/us/blog/post"), None);
    }

    #[test]
    fn test_query_parameter() {
        assert_eq!(detect("https://example.com/blog/post?lang=es"), Some("es"));
        assert_eq!(detect("https://example.com/blog/post?LANG=it-IT"), Some("it"));
        assert_eq!(detect("https://example.com/blog/post?lang=klingon"), None);
    }

    #[test]
    fn test_path_beats_query_and_host() {
        assert_eq!(detect("https://fr.example.com/de/blog/post?lang=es"), Some("de"));
        assert_eq!(detect("https://fr.example.com/blog/post?lang=es"), Some("es"));
    }

    #[test]
    fn test_subdomains() {
        assert_eq!(detect("https://de.example.com/blog/post"), Some("de"));
        assert_eq!(detect("https://EN.example.com/blog/post"), Some("en"));
        assert_eq!(detect("https://ja.example.com/blog/post"), None);
        assert_eq!(detect("https://de.com/blog/post"), None);
    }

    #[test]
    fn test_unmarked_is_unknown_not_english() {
        assert_eq!(detect("https://example.com/blog/hello-world"), None);
        assert_eq!(detect_language_str("not a url"), None);
    }

    #[test]
    fn test_stats_skip_unknown() {
        let stats: LanguageStats = [Some("en"), Some("de"), None, Some("en")].into_iter().collect();
        assert_eq!(stats.count("en"), 2);
        assert_eq!(stats.count("de"), 1);
        assert_eq!(stats.count("fr"), 0);
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            serde_json::json!({ "de": 1, "en": 2 })
        );
    }

    #[test]
    fn test_filter_keeps_allowed_and_unknown() {
        let mut filter = LanguageFilter::new(["EN", "pt-br"]);
        assert!(filter.accepts("https://example.com/en/blog/a"));
        assert!(filter.accepts("https://example.com/pt/blog/a"));
        assert!(filter.accepts("https://example.com/blog/a"));
        assert!(!filter.accepts("https://example.com/de/blog/a"));
        assert!(!filter.accepts("https://fr.example.com/blog/a"));

        let stats = filter.stats();
        assert_eq!(stats.total_processed, 5);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.rejected, 2);
        assert!((stats.rejection_percentage() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_filter_is_passthrough() {
        let mut filter = LanguageFilter::new(Vec::<String>::new());
        assert!(filter.is_passthrough());
        assert!(filter.accepts("https://example.com/de/blog/a"));
    }

    #[test]
    fn test_unsupported_codes_are_reported() {
        let filter = LanguageFilter::new(["en", "xx-large", "tlh"]);
        assert_eq!(filter.ignored_codes(), ["xx-large".to_string(), "tlh".to_string()]);
    }
}
