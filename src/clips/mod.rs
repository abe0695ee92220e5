//! Clip materialization for Repcut.
//!
//! Extracts a self-contained sub-clip from a source video with ffmpeg and
//! verifies the result by probing it. Partial files never survive a failed
//! materialization.

use crate::error::{MaterializeErrorKind, RepcutError, Result};
use crate::ffmpeg;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, instrument};

/// Probed clip duration may deviate from the requested range by this much.
const DURATION_TOLERANCE: f64 = 0.25;
/// Maximum slug length in a clip file name.
const SLUG_MAX: usize = 80;

/// Trait for clip extraction.
#[async_trait]
pub trait Clipper: Send + Sync {
    /// Produce a standalone clip of `source` covering `[start, end]` at
    /// `target_path`, verified playable.
    async fn materialize(&self, source: &Path, start: f64, end: f64, target_path: &Path)
        -> Result<()>;
}

/// ffmpeg-backed clipper.
pub struct FfmpegClipper;

impl FfmpegClipper {
    pub fn new() -> Self {
        Self
    }

    async fn verify(&self, target: &Path, expected_duration: f64) -> Result<()> {
        let size = tokio::fs::metadata(target)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(RepcutError::Materialize {
                kind: MaterializeErrorKind::Io,
                message: format!("Clip {} is missing or empty", target.display()),
            });
        }

        let probe = ffmpeg::probe(target).await.map_err(|e| RepcutError::Materialize {
            kind: MaterializeErrorKind::ProbeFailed,
            message: e.to_string(),
        })?;

        if !probe.has_video || probe.duration <= 0.0 {
            return Err(RepcutError::Materialize {
                kind: MaterializeErrorKind::ProbeFailed,
                message: "Clip has no readable video stream".into(),
            });
        }

        if (probe.duration - expected_duration).abs() > DURATION_TOLERANCE {
            return Err(RepcutError::Materialize {
                kind: MaterializeErrorKind::DurationMismatch,
                message: format!(
                    "Clip duration {:.3}s deviates from requested {:.3}s",
                    probe.duration, expected_duration
                ),
            });
        }

        Ok(())
    }
}

impl Default for FfmpegClipper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clipper for FfmpegClipper {
    #[instrument(skip(self), fields(source = %source.display(), start, end))]
    async fn materialize(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        target_path: &Path,
    ) -> Result<()> {
        if let Some(parent) = target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let source_arg = source.to_string_lossy().to_string();
        let target_arg = target_path.to_string_lossy().to_string();
        let start_arg = format!("{:.3}", start);
        let length_arg = format!("{:.3}", end - start);

        // Re-encode rather than stream-copy: cut points rarely land on
        // keyframes and a copied clip would start on stale GOP data.
        let result = ffmpeg::run(&[
            "-ss", &start_arg,
            "-i", &source_arg,
            "-t", &length_arg,
            "-c:v", "libx264",
            "-preset", "fast",
            "-c:a", "aac",
            "-movflags", "+faststart",
            "-y",
            "-v", "error",
            &target_arg,
        ])
        .await;

        if let Err(e) = result {
            remove_partial(target_path).await;
            let kind = match &e {
                RepcutError::ToolFailed(_) => MaterializeErrorKind::ToolExitNonzero,
                _ => MaterializeErrorKind::Io,
            };
            return Err(RepcutError::Materialize {
                kind,
                message: e.to_string(),
            });
        }

        if let Err(e) = self.verify(target_path, end - start).await {
            remove_partial(target_path).await;
            return Err(e);
        }

        debug!("Materialized clip {}", target_path.display());
        Ok(())
    }
}

async fn remove_partial(path: &Path) {
    tokio::fs::remove_file(path).await.ok();
}

/// Lowercase a name, replace non-alphanumerics with underscores and bound
/// the length.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out.chars().take(SLUG_MAX).collect()
}

/// Deterministic short hash over the identifying tuple.
pub fn short_hash(name: &str, source: &str, start: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(source.as_bytes());
    hasher.update(format!("{:.3}", start).as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

/// Root-relative clip file name: `{slug(name)}_{hash}.mp4`.
pub fn clip_file_name(name: &str, source: &str, start: f64) -> String {
    format!("{}_{}.mp4", slug(name), short_hash(name, source, start))
}
