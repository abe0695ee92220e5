//! Transcription capability for Repcut.
//!
//! Produces time-aligned text segments from a media file's audio track. The
//! pipeline degrades gracefully when transcription fails: the transcript
//! becomes empty and analysis proceeds on frames alone.

mod whisper;

pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A single timed segment of transcribed speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Text content.
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: String) -> Self {
        Self { start, end, text }
    }
}

/// A complete transcript, segments in ascending start order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(mut segments: Vec<TranscriptSegment>) -> Self {
        segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
        Self { segments }
    }

    /// An empty transcript (transcription failed or no speech).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenated text of all segments.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text with leading timestamps, one segment per line.
    pub fn format_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{:.1}s - {:.1}s] {}", s.start, s.end, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Quality gate applied before the transcript reaches the analyzer.
    ///
    /// A transcript counts as usable when the concatenated text is at least
    /// 20 characters and contains at least 3 distinct alphabetic tokens.
    /// Music-only captions ("dance dance dance") fail this gate and must not
    /// drive exercise detection.
    pub fn is_usable(&self) -> bool {
        let text = self.full_text();
        if text.chars().count() < 20 {
            return false;
        }

        let distinct: HashSet<String> = text
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphabetic())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        distinct.len() >= 3
    }
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file and return timed segments.
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript_of(texts: &[&str]) -> Transcript {
        Transcript::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| TranscriptSegment::new(i as f64 * 2.0, i as f64 * 2.0 + 2.0, t.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_segments_sorted_by_start() {
        let t = Transcript::new(vec![
            TranscriptSegment::new(5.0, 7.0, "later".into()),
            TranscriptSegment::new(0.0, 2.0, "first".into()),
        ]);
        assert_eq!(t.segments[0].text, "first");
    }

    #[test]
    fn test_quality_gate_accepts_real_speech() {
        let t = transcript_of(&["start in a plank position", "lower slowly to the floor"]);
        assert!(t.is_usable());
    }

    #[test]
    fn test_quality_gate_rejects_repeated_token() {
        // Long enough, but only one distinct word.
        let t = transcript_of(&["dance dance dance", "dance dance dance dance"]);
        assert!(!t.is_usable());
    }

    #[test]
    fn test_quality_gate_rejects_short_text() {
        let t = transcript_of(&["ok go now"]);
        assert!(!t.is_usable());
    }

    #[test]
    fn test_quality_gate_rejects_empty() {
        assert!(!Transcript::empty().is_usable());
    }
}
