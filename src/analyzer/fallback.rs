//! Keyword fallback when the multimodal analyzer is unavailable.
//!
//! Scans a usable transcript for known exercise names and emits low
//! confidence candidates over the enclosing spoken span. Only spans of at
//! least the minimum exercise duration qualify.

use super::RawCandidate;
use crate::transcription::Transcript;
use regex::Regex;

/// Confidence assigned to keyword-derived candidates.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Minimum span length, matching the analyzer detection invariant.
const MIN_SPAN_SECONDS: f64 = 3.5;

/// Exercise vocabulary recognized by the fallback. Multi-word entries are
/// matched as substrings of the lowercased transcript.
const EXERCISE_KEYWORDS: &[&str] = &[
    "push-up",
    "push up",
    "pushup",
    "pull-up",
    "pull up",
    "squat",
    "lunge",
    "plank",
    "burpee",
    "deadlift",
    "handstand",
    "crunch",
    "sit-up",
    "sit up",
    "bridge",
    "dip",
    "row",
    "hollow hold",
    "dead hang",
    "calf raise",
    "hip thrust",
    "mountain climber",
    "jumping jack",
    "downward dog",
    "pigeon pose",
    "cobra",
    "superman",
    "bird dog",
    "glute kickback",
    "side plank",
    "wall sit",
    "leg raise",
    "russian twist",
];

/// Produce candidates from transcript keywords.
///
/// For each keyword present, consecutive segments mentioning it are merged
/// into one span; the span is emitted only when it covers at least 3.5 s.
pub fn keyword_fallback(transcript: &Transcript) -> Vec<RawCandidate> {
    let mut candidates: Vec<RawCandidate> = Vec::new();

    for keyword in EXERCISE_KEYWORDS {
        // Word-boundary match with optional plural, so "squats" counts but
        // "squatter" does not.
        let Ok(pattern) = Regex::new(&format!(r"\b{}(?:s|es)?\b", regex::escape(keyword))) else {
            continue;
        };
        let mut span: Option<(f64, f64)> = None;

        for segment in &transcript.segments {
            let mentions = pattern.is_match(&segment.text.to_lowercase());
            match (&mut span, mentions) {
                (None, true) => span = Some((segment.start, segment.end)),
                (Some((_, end)), true) => *end = segment.end,
                (Some(_), false) => {
                    flush(&mut candidates, keyword, &mut span);
                }
                (None, false) => {}
            }
        }
        flush(&mut candidates, keyword, &mut span);
    }

    candidates.sort_by(|a, b| {
        let sa = a.start.as_f64().unwrap_or(0.0);
        let sb = b.start.as_f64().unwrap_or(0.0);
        sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

fn flush(candidates: &mut Vec<RawCandidate>, keyword: &str, span: &mut Option<(f64, f64)>) {
    if let Some((start, end)) = span.take() {
        if end - start >= MIN_SPAN_SECONDS {
            candidates.push(RawCandidate::timed(keyword, start, end, FALLBACK_CONFIDENCE));
        }
    }
}
