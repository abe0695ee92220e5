//! URL canonicalization and platform classification.

use super::Platform;
use crate::error::{RepcutError, Result};
use url::Url;

/// Classification of an input URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    /// Points at exactly one media item.
    Single,
    /// May reference several media items; the downloader decides.
    CarouselCandidate,
    /// No recognized platform family.
    Unsupported,
}

/// A canonicalized source URL.
#[derive(Debug, Clone)]
pub struct SourceUrl {
    /// The URL exactly as submitted.
    pub raw: String,
    /// Canonical form: no query/fragment, lowercased scheme and host, no
    /// trailing slash. Path case is preserved (shortcodes are case-sensitive).
    pub normalized: String,
    pub platform: Platform,
    pub class: UrlClass,
    /// Explicit per-item index when the URL encodes one (1-based).
    pub index_hint: Option<u32>,
}

impl SourceUrl {
    /// Parse, normalize and classify an input URL.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = canonicalize(input)?;
        let (platform, class) = classify(&normalized)
            .ok_or_else(|| RepcutError::UnsupportedUrl(input.to_string()))?;

        Ok(Self {
            raw: input.to_string(),
            normalized,
            platform,
            class,
            index_hint: carousel_index_hint(input),
        })
    }
}

/// Normalize a URL: strip query string and fragment, lowercase scheme and
/// host, preserve the path, drop any trailing slash.
pub fn canonicalize(input: &str) -> Result<String> {
    let url = Url::parse(input.trim())
        .map_err(|e| RepcutError::InvalidInput(format!("Cannot parse URL '{}': {}", input, e)))?;

    let scheme = url.scheme().to_lowercase();
    let host = url
        .host_str()
        .ok_or_else(|| RepcutError::InvalidInput(format!("URL has no host: {}", input)))?
        .to_lowercase();

    let path = url.path().trim_end_matches('/');

    Ok(format!("{}://{}{}", scheme, host, path))
}

/// Classify a normalized URL into a platform family and item shape.
///
/// Returns None for hosts outside the three recognized families. Carousel
/// candidacy is a hint only; the downloader makes the final call from the
/// post metadata.
pub fn classify(normalized: &str) -> Option<(Platform, UrlClass)> {
    let url = Url::parse(normalized).ok()?;
    let host = url.host_str()?;
    let path = url.path();

    if host.ends_with("instagram.com") {
        // /p/ posts can be multi-image/multi-video carousels; /reel/ cannot.
        if path.starts_with("/reel/") || path.starts_with("/reels/") {
            return Some((Platform::Instagram, UrlClass::Single));
        }
        if path.starts_with("/p/") {
            return Some((Platform::Instagram, UrlClass::CarouselCandidate));
        }
        return Some((Platform::Instagram, UrlClass::Unsupported));
    }

    if host.ends_with("tiktok.com") {
        if path.contains("/photo/") {
            return Some((Platform::TikTok, UrlClass::CarouselCandidate));
        }
        if path.contains("/video/") || host.starts_with("vm.") || host.starts_with("vt.") {
            return Some((Platform::TikTok, UrlClass::Single));
        }
        return Some((Platform::TikTok, UrlClass::Unsupported));
    }

    if host.ends_with("youtube.com") || host == "youtu.be" {
        if path.starts_with("/shorts/") || host == "youtu.be" || path.starts_with("/watch") {
            return Some((Platform::YouTube, UrlClass::Single));
        }
        return Some((Platform::YouTube, UrlClass::Unsupported));
    }

    None
}

/// Extract an explicit carousel item index from the raw URL, if present.
///
/// Instagram encodes the viewed item as `?img_index=N` (1-based).
pub fn carousel_index_hint(raw: &str) -> Option<u32> {
    let url = Url::parse(raw.trim()).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "img_index")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .filter(|&n| n >= 1)
}
