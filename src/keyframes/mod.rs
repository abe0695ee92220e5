//! Keyframe extraction for Repcut.
//!
//! Chooses the minimum set of frames sufficient for the analyzer to reason
//! about complete movements: cut detection over an adaptive threshold, dense
//! sampling within cuts, change-significance pruning, and global rate
//! bounds. The extractor does no interpretation of its own.

mod select;

pub use select::{consecutive_scores, detect_cuts, plane_diff, select_frames, PlannedFrame};

use crate::config::KeyframeSettings;
use crate::error::{RepcutError, Result};
use crate::ffmpeg;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Width of the grayscale analysis plane.
const PLANE_W: usize = 64;
/// Height of the grayscale analysis plane.
const PLANE_H: usize = 36;
/// Output width of materialized keyframe images.
const FRAME_OUT_W: u32 = 512;

/// One selected keyframe on disk.
#[derive(Debug, Clone)]
pub struct Keyframe {
    pub path: PathBuf,
    /// Index of the cut-delimited segment this frame belongs to.
    pub cut_index: usize,
    /// Frame number in the source video's native rate.
    pub frame_number: u64,
    /// Timestamp in seconds.
    pub timestamp: f64,
    /// Difference score against the previously kept frame.
    pub score: f64,
}

impl Keyframe {
    /// File name encoding placement so downstream never reparses the video:
    /// `cut{c}_f{frame}_t{ms}_d{score}.jpg`.
    pub fn file_name(&self) -> String {
        format!(
            "cut{:02}_f{:05}_t{:07}_d{:.4}.jpg",
            self.cut_index,
            self.frame_number,
            (self.timestamp * 1000.0).round() as u64,
            self.score,
        )
    }
}

/// Trait for keyframe extraction.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract keyframes for `media` into `work_dir`, ordered by timestamp.
    /// Also returns the probed video duration.
    async fn extract(&self, media: &Path, work_dir: &Path) -> Result<(Vec<Keyframe>, f64)>;
}

/// ffmpeg-backed keyframe extractor.
pub struct FfmpegFrameExtractor {
    settings: KeyframeSettings,
}

impl FfmpegFrameExtractor {
    pub fn new(settings: KeyframeSettings) -> Self {
        Self { settings }
    }

    /// Decode the video into small grayscale planes at the dense sampling
    /// rate. One plane per sample, `PLANE_W * PLANE_H` bytes each.
    async fn decode_planes(&self, media: &Path) -> Result<Vec<Vec<u8>>> {
        let fps_arg = format!("fps={},scale={}:{},format=gray", self.settings.dense_fps, PLANE_W, PLANE_H);
        let media_arg = media.to_string_lossy().to_string();

        let raw = ffmpeg::run_capture(&[
            "-i", &media_arg,
            "-vf", &fps_arg,
            "-f", "rawvideo",
            "-v", "error",
            "pipe:1",
        ])
        .await?;

        let plane_len = PLANE_W * PLANE_H;
        if raw.len() < plane_len {
            return Err(RepcutError::Keyframes("Video decoded to zero frames".into()));
        }

        Ok(raw
            .chunks_exact(plane_len)
            .map(|c| c.to_vec())
            .collect())
    }

    /// Dump every dense sample as a JPEG so selected frames can be kept and
    /// the rest removed without re-decoding.
    async fn dump_dense_frames(&self, media: &Path, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let fps_arg = format!("fps={},scale={}:-2", self.settings.dense_fps, FRAME_OUT_W);
        let pattern = dir.join("frame_%05d.jpg");
        let media_arg = media.to_string_lossy().to_string();
        let pattern_arg = pattern.to_string_lossy().to_string();

        ffmpeg::run(&[
            "-i", &media_arg,
            "-vf", &fps_arg,
            "-qscale:v", "3",
            "-v", "error",
            "-y", &pattern_arg,
        ])
        .await
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    #[instrument(skip(self, work_dir), fields(media = %media.display()))]
    async fn extract(&self, media: &Path, work_dir: &Path) -> Result<(Vec<Keyframe>, f64)> {
        let probe = ffmpeg::probe(media).await?;
        if !probe.has_video {
            return Err(RepcutError::Decode(format!(
                "No video stream in {}",
                media.display()
            )));
        }

        let planes = self.decode_planes(media).await?;
        let dense_fps = self.settings.dense_fps as f64;
        let timestamps: Vec<f64> = (0..planes.len()).map(|i| i as f64 / dense_fps).collect();

        debug!("Decoded {} analysis planes", planes.len());

        // Frame differencing and selection are CPU-bound; keep them off the
        // async workers.
        let settings = self.settings.clone();
        let planned = tokio::task::spawn_blocking(move || {
            let scores = consecutive_scores(&planes);
            let cuts = detect_cuts(&scores, settings.cut_window, settings.cut_sigma);
            select_frames(
                &planes,
                &timestamps,
                &cuts,
                settings.min_fps,
                settings.max_fps,
            )
        })
        .await
        .map_err(|e| RepcutError::Keyframes(format!("Selection task panicked: {}", e)))?;

        let dense_dir = work_dir.join("dense");
        self.dump_dense_frames(media, &dense_dir).await?;

        let frames_dir = work_dir.join("frames");
        tokio::fs::create_dir_all(&frames_dir).await?;

        let source_fps = probe.fps.unwrap_or(dense_fps);
        let mut keyframes = Vec::with_capacity(planned.len());

        for frame in &planned {
            let timestamp = frame.sample_index as f64 / dense_fps;
            let mut kf = Keyframe {
                path: PathBuf::new(),
                cut_index: frame.cut_index,
                frame_number: (timestamp * source_fps).round() as u64,
                timestamp,
                score: frame.score,
            };

            // ffmpeg image2 numbering is 1-based.
            let dense_name = dense_dir.join(format!("frame_{:05}.jpg", frame.sample_index + 1));
            let final_path = frames_dir.join(kf.file_name());
            tokio::fs::rename(&dense_name, &final_path).await.map_err(|e| {
                RepcutError::Keyframes(format!(
                    "Missing dense frame {}: {}",
                    dense_name.display(),
                    e
                ))
            })?;
            kf.path = final_path;
            keyframes.push(kf);
        }

        // Unselected dense frames are scrap.
        tokio::fs::remove_dir_all(&dense_dir).await.ok();

        info!(
            "Selected {} keyframes across {} cuts",
            keyframes.len(),
            keyframes.last().map(|k| k.cut_index + 1).unwrap_or(0)
        );

        Ok((keyframes, probe.duration))
    }
}
