//! Downloader capability for Repcut.
//!
//! A downloader turns a source URL into local media files plus post
//! metadata. Carousel posts yield one file per item in stable order. The
//! pipeline treats downloader output as untrusted; file existence does not
//! imply playability.

mod ytdlp;

pub use ytdlp::YtDlpDownloader;

use crate::error::Result;
use crate::source::SourceUrl;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata scraped from the source post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostMetadata {
    /// Post title or headline, if any.
    pub title: Option<String>,
    /// Caption / description text.
    pub description: Option<String>,
    /// Hashtags and platform tags.
    pub tags: Vec<String>,
    /// Uploader handle.
    pub uploader: Option<String>,
    /// Total duration reported by the platform, seconds.
    pub duration_seconds: Option<f64>,
}

/// Result of downloading one URL.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    /// One file per media item, in stable carousel order.
    pub media_files: Vec<PathBuf>,
    /// Post metadata shared by all items.
    pub metadata: PostMetadata,
    /// Directory the files live in; owned by the calling pipeline.
    pub temp_dir: PathBuf,
}

impl DownloadedMedia {
    /// Whether the download resolved to a multi-item carousel.
    pub fn is_carousel(&self) -> bool {
        self.media_files.len() > 1
    }
}

/// Trait for media downloaders.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download all media items for a URL into `work_dir`.
    async fn download(&self, url: &SourceUrl, work_dir: &Path) -> Result<DownloadedMedia>;
}
