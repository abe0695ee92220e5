//! Multimodal analysis capability for Repcut.
//!
//! An analyzer looks at selected keyframes plus an optional transcript and
//! returns candidate exercise segments with structured coaching fields. The
//! keyword fallback covers analyzer outages when a usable transcript exists.

mod fallback;
mod openai;

pub use fallback::keyword_fallback;
pub use openai::OpenAIAnalyzer;

use crate::error::Result;
use crate::keyframes::Keyframe;
use crate::source::Platform;
use crate::transcription::Transcript;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

fn default_confidence() -> f64 {
    0.5
}

/// A candidate exercise segment as returned by an analyzer, before
/// normalization. `start`/`end` stay loosely typed because models sometimes
/// return them as strings; the segment normalizer coerces and validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub start: serde_json::Value,
    pub end: serde_json::Value,
    #[serde(default)]
    pub how_to: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub counteracts: Option<String>,
    #[serde(default)]
    pub rounds_reps: Option<String>,
    #[serde(default)]
    pub fitness_level: Option<i64>,
    #[serde(default)]
    pub intensity: Option<i64>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl RawCandidate {
    /// Build a candidate with numeric times (used by the fallback path and
    /// tests).
    pub fn timed(name: &str, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            start: serde_json::json!(start),
            end: serde_json::json!(end),
            how_to: None,
            benefits: None,
            counteracts: None,
            rounds_reps: None,
            fitness_level: None,
            intensity: None,
            confidence,
        }
    }
}

/// Context handed to the analyzer alongside frames and transcript.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub platform: Platform,
    /// 1-based position within the carousel.
    pub carousel_index: u32,
    /// Total carousel items (1 for single posts).
    pub carousel_total: u32,
    /// Advisory: the first item of a carousel is often a hook, not a
    /// demonstration.
    pub first_item_may_be_hook: bool,
    /// Caption text from the post.
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Probed video duration in seconds.
    pub duration: f64,
}

/// Trait for multimodal exercise analysis.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze keyframes into candidate exercise segments.
    ///
    /// Implementations must honor the detection invariants: segments are at
    /// least 3.5 s long, no overlapping segments for the same movement
    /// (a flow or its components, never both), an empty list rather than a
    /// fabricated result, and confidence within [0, 1].
    async fn analyze(
        &self,
        frames: &[Keyframe],
        transcript: Option<&Transcript>,
        context: &AnalysisContext,
    ) -> Result<Vec<RawCandidate>>;
}

/// Trait for story generation (a text-only coach used by curation).
#[async_trait]
pub trait StoryCoach: Send + Sync {
    /// Turn a user prompt into `n` short exercise-need stories.
    async fn generate_stories(&self, user_prompt: &str, n: usize) -> Result<Vec<String>>;
}
