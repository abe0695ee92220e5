//! Segment normalization for Repcut.
//!
//! Turns raw analyzer candidates into the final set of exercise segments:
//! type coercion, clipping, minimum duration, near-duplicate suppression,
//! overlap consolidation, single-segment extension and confidence filtering.

use crate::analyzer::RawCandidate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum exercise duration in seconds.
pub const MIN_DURATION: f64 = 3.5;
/// Candidates whose starts are closer than this collapse into one.
const NEAR_DUPLICATE_WINDOW: f64 = 3.0;
/// Intersection-over-union above which two candidates are the same movement.
const OVERLAP_IOU: f64 = 0.5;
/// A lone surviving candidate covering less than this share of the video is
/// extended to the full duration.
const EXTEND_COVERAGE: f64 = 0.8;
/// Candidates below this confidence are dropped.
const MIN_CONFIDENCE: f64 = 0.3;

/// A validated, normalized exercise segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub how_to: Option<String>,
    pub benefits: Option<String>,
    pub counteracts: Option<String>,
    pub rounds_reps: Option<String>,
    pub fitness_level: Option<i32>,
    pub intensity: Option<i32>,
    pub confidence: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Coerce a raw candidate, rejecting non-numeric times.
fn coerce(raw: &RawCandidate) -> Option<Segment> {
    let start = coerce_number(&raw.start)?;
    let end = coerce_number(&raw.end)?;
    if raw.name.trim().is_empty() {
        return None;
    }

    Some(Segment {
        name: raw.name.trim().to_string(),
        start,
        end,
        how_to: raw.how_to.clone(),
        benefits: raw.benefits.clone(),
        counteracts: raw.counteracts.clone(),
        rounds_reps: raw.rounds_reps.clone(),
        fitness_level: raw.fitness_level.map(|v| v.clamp(0, 10) as i32),
        intensity: raw.intensity.map(|v| v.clamp(0, 10) as i32),
        confidence: raw.confidence.clamp(0.0, 1.0),
    })
}

fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Normalize raw candidates against the video duration `t`.
pub fn normalize(candidates: &[RawCandidate], t: f64) -> Vec<Segment> {
    // 1-2: coerce, clip to [0, t], enforce minimum duration.
    let mut segments: Vec<Segment> = candidates
        .iter()
        .filter_map(coerce)
        .filter_map(|mut s| {
            s.start = s.start.max(0.0);
            s.end = s.end.min(t);
            if s.end - s.start >= MIN_DURATION {
                Some(s)
            } else {
                None
            }
        })
        .collect();

    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));

    // 3: near-duplicate suppression by start proximity.
    segments = collapse(segments, |a, b| {
        (a.start - b.start).abs() < NEAR_DUPLICATE_WINDOW
    });

    // 4: overlap consolidation by IoU.
    segments = collapse(segments, |a, b| iou(a, b) > OVERLAP_IOU);

    // 5: single-segment extension.
    if segments.len() == 1 && t > 0.0 && segments[0].duration() < EXTEND_COVERAGE * t {
        debug!(
            "Extending lone segment '{}' from {:.1}s to full video",
            segments[0].name,
            segments[0].duration()
        );
        segments[0].start = 0.0;
        segments[0].end = t;
    }

    // 6: confidence filter.
    segments.retain(|s| s.confidence >= MIN_CONFIDENCE);

    // 7: stable order by ascending start.
    segments.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    segments
}

/// Collapse pairs matching `same`, keeping higher confidence and breaking
/// ties by longer duration.
fn collapse<F>(segments: Vec<Segment>, same: F) -> Vec<Segment>
where
    F: Fn(&Segment, &Segment) -> bool,
{
    let mut kept: Vec<Segment> = Vec::with_capacity(segments.len());

    for candidate in segments {
        match kept.iter_mut().find(|k| same(k, &candidate)) {
            Some(existing) => {
                if wins(&candidate, existing) {
                    *existing = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }

    kept
}

fn wins(challenger: &Segment, incumbent: &Segment) -> bool {
    if challenger.confidence != incumbent.confidence {
        return challenger.confidence > incumbent.confidence;
    }
    challenger.duration() > incumbent.duration()
}

fn iou(a: &Segment, b: &Segment) -> f64 {
    let intersection = (a.end.min(b.end) - a.start.max(b.start)).max(0.0);
    let union = (a.end.max(b.end) - a.start.min(b.start)).max(f64::EPSILON);
    intersection / union
}
