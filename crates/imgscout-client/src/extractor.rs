use std::sync::Arc;

use imgscout_core::error::AppError;
use imgscout_core::traits::ImageExtractor;
use regex::Regex;
use scraper::{Html, Selector};

/// Fallback patterns for perfume pages on parfumo.com.
pub const PARFUMO_PATTERNS: &[&str] = &[
    r#"(https://media\.parfumo\.com/perfume_social/[^"'\s]+\.(?:jpg|png|webp)[^"'\s]*)"#,
    r#"(https://media\.parfumo\.com/perfumes/[^"'\s]+\.(?:jpg|png|webp)[^"'\s]*)"#,
    r#"(https://images\.parfumo\.de/perfume_bottle/[^"'\s]+\.(?:jpg|png|webp))"#,
];

/// Finds a page's representative image.
///
/// Looks at the first `og:image` meta tag, then tries each fallback regex
/// against the raw content in order. For a fallback, capture group 1 is
/// used when present, otherwise the whole match.
#[derive(Clone)]
pub struct PatternExtractor {
    og_selector: Arc<Selector>,
    reject_markers: Vec<String>,
    required_substring: Option<String>,
    fallbacks: Vec<Regex>,
}

impl PatternExtractor {
    /// `og:image` only, rejecting URLs that contain `404`.
    pub fn new() -> Result<Self, AppError> {
        let og_selector = Selector::parse(r#"meta[property="og:image"]"#)
            .map_err(|e| AppError::ConfigError(format!("Invalid selector: {e}")))?;
        Ok(Self {
            og_selector: Arc::new(og_selector),
            reject_markers: vec!["404".to_string()],
            required_substring: None,
            fallbacks: Vec::new(),
        })
    }

    /// Preset for parfumo.com perfume pages.
    pub fn parfumo() -> Result<Self, AppError> {
        Self::new()?
            .with_required_substring("parfumo")
            .with_fallback_patterns(PARFUMO_PATTERNS.iter().copied())
    }

    /// Only accept an `og:image` URL that contains `needle`.
    pub fn with_required_substring(mut self, needle: impl Into<String>) -> Self {
        self.required_substring = Some(needle.into());
        self
    }

    /// Reject an `og:image` URL that contains `marker`.
    pub fn with_reject_marker(mut self, marker: impl Into<String>) -> Self {
        self.reject_markers.push(marker.into());
        self
    }

    pub fn with_fallback_patterns<'a>(
        mut self,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, AppError> {
        for pattern in patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                AppError::ConfigError(format!("Invalid fallback pattern '{pattern}': {e}"))
            })?;
            self.fallbacks.push(regex);
        }
        Ok(self)
    }

    fn og_image(&self, content: &str) -> Option<String> {
        let document = Html::parse_document(content);
        let url = document
            .select(&self.og_selector)
            .next()?
            .value()
            .attr("content")?
            .trim();
        if url.is_empty() || !self.accepts(url) {
            return None;
        }
        Some(url.to_string())
    }

    fn accepts(&self, url: &str) -> bool {
        if self.reject_markers.iter().any(|m| url.contains(m.as_str())) {
            return false;
        }
        match &self.required_substring {
            Some(needle) => url.contains(needle.as_str()),
            None => true,
        }
    }

    fn fallback(&self, content: &str) -> Option<String> {
        self.fallbacks.iter().find_map(|regex| {
            let caps = regex.captures(content)?;
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string())
        })
    }
}

impl ImageExtractor for PatternExtractor {
    fn extract(&self, content: &str) -> Result<Option<String>, AppError> {
        Ok(self.og_image(content).or_else(|| self.fallback(content)))
    }
}
