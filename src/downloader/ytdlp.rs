//! yt-dlp backed downloader.
//!
//! One implementation covers all three platform families; per-family
//! argument differences are kept in one place so each family behaves like a
//! variant of the same contract.

use super::{DownloadedMedia, Downloader, PostMetadata};
use crate::error::{DownloadErrorKind, RepcutError, Result};
use crate::source::{Platform, SourceUrl, UrlClass};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Downloader that shells out to yt-dlp.
pub struct YtDlpDownloader;

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self
    }

    /// Fetch post metadata without downloading media.
    async fn fetch_metadata(&self, url: &SourceUrl) -> Result<PostMetadata> {
        let output = Command::new("yt-dlp")
            .args([
                "--dump-single-json",
                "--no-download",
                "--no-warnings",
                &url.normalized,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(map_spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_failure(&stderr));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| RepcutError::Download {
                kind: DownloadErrorKind::Decode,
                message: format!("Unparseable yt-dlp metadata: {}", e),
            })?;

        Ok(parse_metadata(&json))
    }

    /// Per-family yt-dlp arguments.
    fn family_args(&self, url: &SourceUrl) -> Vec<&'static str> {
        match (url.platform, url.class) {
            // Carousel candidates download every entry; stable order comes
            // from the playlist index in the output template.
            (Platform::Instagram, UrlClass::CarouselCandidate)
            | (Platform::TikTok, UrlClass::CarouselCandidate) => vec!["--yes-playlist"],
            _ => vec!["--no-playlist"],
        }
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    #[instrument(skip(self, work_dir), fields(url = %url.normalized))]
    async fn download(&self, url: &SourceUrl, work_dir: &Path) -> Result<DownloadedMedia> {
        tokio::fs::create_dir_all(work_dir).await?;

        let metadata = match self.fetch_metadata(url).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Metadata fetch failed, continuing with empty metadata: {}", e);
                PostMetadata::default()
            }
        };

        info!("Downloading media via yt-dlp");

        let template = work_dir.join("item_%(playlist_index|1)02d.%(ext)s");

        let mut cmd = Command::new("yt-dlp");
        cmd.arg("--output")
            .arg(template.as_os_str())
            .arg("--format")
            .arg("mp4/bestvideo*+bestaudio/best")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--quiet")
            .arg("--no-warnings");
        for arg in self.family_args(url) {
            cmd.arg(arg);
        }
        cmd.arg(&url.normalized);

        let output = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(map_spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_failure(&stderr));
        }

        let media_files = collect_items(work_dir)?;
        if media_files.is_empty() {
            return Err(RepcutError::Download {
                kind: DownloadErrorKind::Decode,
                message: "yt-dlp reported success but produced no media files".into(),
            });
        }

        debug!("Downloaded {} media item(s)", media_files.len());

        Ok(DownloadedMedia {
            media_files,
            metadata,
            temp_dir: work_dir.to_path_buf(),
        })
    }
}

/// Gather downloaded items in stable carousel order.
fn collect_items(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("item_"))
                .unwrap_or(false)
        })
        .collect();

    // item_01, item_02, ... sorts lexicographically into playlist order.
    files.sort();
    Ok(files)
}

fn parse_metadata(json: &serde_json::Value) -> PostMetadata {
    // Carousel posts come back as a playlist wrapper; the caption lives on
    // the wrapper, not the entries.
    let title = json["title"].as_str().map(|s| s.to_string());
    let description = json["description"].as_str().map(|s| s.to_string());
    let uploader = json["uploader"]
        .as_str()
        .or_else(|| json["channel"].as_str())
        .map(|s| s.to_string());
    let duration_seconds = json["duration"].as_f64();
    let tags = json["tags"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|t| t.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    PostMetadata {
        title,
        description,
        tags,
        uploader,
        duration_seconds,
    }
}

fn map_spawn_error(e: std::io::Error) -> RepcutError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RepcutError::ToolNotFound("yt-dlp".into())
    } else {
        RepcutError::Download {
            kind: DownloadErrorKind::Network,
            message: format!("yt-dlp execution failed: {}", e),
        }
    }
}

/// Map yt-dlp stderr text onto the downloader failure taxonomy.
fn classify_ytdlp_failure(stderr: &str) -> RepcutError {
    let lower = stderr.to_lowercase();
    let kind = if lower.contains("unsupported url") {
        DownloadErrorKind::Unsupported
    } else if lower.contains("404")
        || lower.contains("not found")
        || lower.contains("unavailable")
        || lower.contains("does not exist")
    {
        DownloadErrorKind::NotFound
    } else if lower.contains("login") || lower.contains("authentication") || lower.contains("rate-limit") {
        DownloadErrorKind::Auth
    } else if lower.contains("unable to download") || lower.contains("timed out") || lower.contains("connection") {
        DownloadErrorKind::Network
    } else {
        DownloadErrorKind::Decode
    };

    RepcutError::Download {
        kind,
        message: stderr.lines().last().unwrap_or("yt-dlp failed").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure_kinds() {
        let err = classify_ytdlp_failure("ERROR: Unsupported URL: https://x");
        assert!(matches!(
            err,
            RepcutError::Download { kind: DownloadErrorKind::Unsupported, .. }
        ));

        let err = classify_ytdlp_failure("ERROR: This post is unavailable");
        assert!(matches!(
            err,
            RepcutError::Download { kind: DownloadErrorKind::NotFound, .. }
        ));

        let err = classify_ytdlp_failure("ERROR: Login required to access this content");
        assert!(matches!(
            err,
            RepcutError::Download { kind: DownloadErrorKind::Auth, .. }
        ));
    }

    #[test]
    fn test_collect_items_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["item_02.mp4", "item_01.mp4", "item_10.mp4", "other.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let items = collect_items(dir.path()).unwrap();
        let names: Vec<_> = items
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["item_01.mp4", "item_02.mp4", "item_10.mp4"]);
    }

    #[test]
    fn test_parse_metadata() {
        let json = serde_json::json!({
            "title": "Morning mobility",
            "description": "3 moves for tight hips",
            "uploader": "coach",
            "duration": 42.5,
            "tags": ["mobility", "hips"],
        });
        let meta = parse_metadata(&json);
        assert_eq!(meta.title.as_deref(), Some("Morning mobility"));
        assert_eq!(meta.tags.len(), 2);
        assert_eq!(meta.duration_seconds, Some(42.5));
    }
}
