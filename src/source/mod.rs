//! Source URL handling for Repcut.
//!
//! Canonicalizes incoming post URLs, classifies the owning platform family,
//! and extracts explicit carousel item indexes where the URL encodes one.

mod canonical;

pub use canonical::{canonicalize, carousel_index_hint, classify, SourceUrl, UrlClass};

use serde::{Deserialize, Serialize};

/// Platform family a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    TikTok,
    YouTube,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Instagram => write!(f, "instagram"),
            Platform::TikTok => write!(f, "tiktok"),
            Platform::YouTube => write!(f, "youtube"),
        }
    }
}
