//! Frame selection math: cut detection, change-significance pruning and
//! rate bounds over pre-decoded grayscale planes.

/// A frame chosen for the analyzer, identified by its dense-sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFrame {
    /// Index into the dense sample sequence.
    pub sample_index: usize,
    /// Cut-delimited segment this frame falls in.
    pub cut_index: usize,
    /// Difference score against the previously kept frame (boundary frames
    /// score against their predecessor sample).
    pub score: f64,
}

/// Mean absolute pixel difference between two equally sized gray planes,
/// in 0..=255.
pub fn plane_diff(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let sum: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| x.abs_diff(*y) as u64)
        .sum();
    sum as f64 / a.len() as f64
}

/// Difference score between each consecutive pair of planes.
/// `scores[i]` is the difference between sample `i` and sample `i + 1`.
pub fn consecutive_scores(planes: &[Vec<u8>]) -> Vec<f64> {
    planes
        .windows(2)
        .map(|w| plane_diff(&w[0], &w[1]))
        .collect()
}

/// Minimum trailing history before the adaptive threshold is trusted.
const MIN_WINDOW_FILL: usize = 8;
/// Absolute floor below which a difference never counts as a cut.
const CUT_SCORE_FLOOR: f64 = 8.0;

/// Detect cut boundaries with an adaptive threshold (window mean + sigma
/// standard deviations). Returns ascending sample indexes that begin a new
/// segment; index 0 is always present, and the sample count closes the last
/// segment implicitly.
pub fn detect_cuts(scores: &[f64], window: usize, sigma: f64) -> Vec<usize> {
    let mut cuts = vec![0usize];
    let mut history: Vec<f64> = Vec::with_capacity(window);

    for (i, &score) in scores.iter().enumerate() {
        if history.len() >= MIN_WINDOW_FILL {
            let mean = history.iter().sum::<f64>() / history.len() as f64;
            let var = history
                .iter()
                .map(|s| (s - mean).powi(2))
                .sum::<f64>()
                / history.len() as f64;
            let threshold = mean + sigma * var.sqrt();

            if score > threshold.max(CUT_SCORE_FLOOR) {
                // scores[i] separates sample i from sample i+1.
                cuts.push(i + 1);
                history.clear();
                continue;
            }
        }

        history.push(score);
        if history.len() > window {
            history.remove(0);
        }
    }

    cuts
}

/// Select frames per segment by change significance, then enforce the
/// global rate floor and ceiling.
///
/// `timestamps[i]` is the presentation time of sample `i`; `cuts` is the
/// output of [`detect_cuts`].
pub fn select_frames(
    planes: &[Vec<u8>],
    timestamps: &[f64],
    cuts: &[usize],
    min_fps: u32,
    max_fps: u32,
) -> Vec<PlannedFrame> {
    let n = planes.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![PlannedFrame { sample_index: 0, cut_index: 0, score: 0.0 }];
    }

    let scores = consecutive_scores(planes);
    let mut kept: Vec<PlannedFrame> = Vec::new();

    for (cut_index, seg) in segment_bounds(cuts, n).into_iter().enumerate() {
        let (start, end) = seg;

        // Per-segment significance threshold: mean consecutive difference
        // inside the segment.
        let seg_scores = &scores[start..end.saturating_sub(1).max(start)];
        let threshold = if seg_scores.is_empty() {
            0.0
        } else {
            seg_scores.iter().sum::<f64>() / seg_scores.len() as f64
        };

        // Cut-boundary frame is always kept.
        kept.push(PlannedFrame {
            sample_index: start,
            cut_index,
            score: if start == 0 { 0.0 } else { scores[start - 1] },
        });
        let mut last_kept = start;

        for i in (start + 1)..end {
            let diff = plane_diff(&planes[i], &planes[last_kept]);
            if diff > threshold && threshold > 0.0 {
                kept.push(PlannedFrame { sample_index: i, cut_index, score: diff });
                last_kept = i;
            }
        }
    }

    // Overall last frame is always a boundary.
    let last_cut = cuts.len() - 1;
    if kept.last().map(|f| f.sample_index) != Some(n - 1) {
        kept.push(PlannedFrame {
            sample_index: n - 1,
            cut_index: last_cut,
            score: scores[n - 2],
        });
    }

    enforce_floor(&mut kept, planes, timestamps, cuts, min_fps);
    enforce_ceiling(&mut kept, timestamps, max_fps, n);

    kept.sort_by_key(|f| f.sample_index);
    kept.dedup_by_key(|f| f.sample_index);
    kept
}

/// (start, end) sample ranges for each cut segment; `end` is exclusive.
fn segment_bounds(cuts: &[usize], n: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::with_capacity(cuts.len());
    for (i, &start) in cuts.iter().enumerate() {
        let end = cuts.get(i + 1).copied().unwrap_or(n);
        if start < end {
            bounds.push((start, end));
        }
    }
    bounds
}

/// Reintroduce evenly placed frames wherever pruning left a gap longer than
/// the floor interval (1 / min_fps seconds).
fn enforce_floor(
    kept: &mut Vec<PlannedFrame>,
    planes: &[Vec<u8>],
    timestamps: &[f64],
    cuts: &[usize],
    min_fps: u32,
) {
    if min_fps == 0 {
        return;
    }
    let max_gap = 1.0 / min_fps as f64;

    kept.sort_by_key(|f| f.sample_index);
    let mut inserts: Vec<PlannedFrame> = Vec::new();

    for pair in kept.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let gap = timestamps[b.sample_index] - timestamps[a.sample_index];
        if gap <= max_gap {
            continue;
        }

        let missing = (gap / max_gap).ceil() as usize - 1;
        for k in 1..=missing {
            let target =
                timestamps[a.sample_index] + gap * (k as f64) / ((missing + 1) as f64);
            let idx = nearest_sample(timestamps, target);
            if idx > a.sample_index && idx < b.sample_index {
                inserts.push(PlannedFrame {
                    sample_index: idx,
                    cut_index: cut_of(cuts, idx),
                    score: plane_diff(&planes[idx], &planes[a.sample_index]),
                });
            }
        }
    }

    kept.extend(inserts);
    kept.sort_by_key(|f| f.sample_index);
    kept.dedup_by_key(|f| f.sample_index);
}

/// Drop lowest-score frames from any one-second bucket denser than max_fps.
/// The overall first and last frames are never dropped.
fn enforce_ceiling(kept: &mut Vec<PlannedFrame>, timestamps: &[f64], max_fps: u32, n: usize) {
    if max_fps == 0 {
        return;
    }

    loop {
        let mut counts: std::collections::HashMap<u64, Vec<usize>> = std::collections::HashMap::new();
        for (pos, f) in kept.iter().enumerate() {
            let bucket = timestamps[f.sample_index].floor() as u64;
            counts.entry(bucket).or_default().push(pos);
        }

        let overfull = counts
            .into_iter()
            .find(|(_, positions)| positions.len() > max_fps as usize);

        let Some((_, positions)) = overfull else { break };

        // Weakest frame in the bucket goes first; endpoints are protected.
        let victim = positions
            .into_iter()
            .filter(|&p| kept[p].sample_index != 0 && kept[p].sample_index != n - 1)
            .min_by(|&a, &b| {
                kept[a]
                    .score
                    .partial_cmp(&kept[b].score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        match victim {
            Some(p) => {
                kept.remove(p);
            }
            None => break,
        }
    }
}

fn nearest_sample(timestamps: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (i, &t) in timestamps.iter().enumerate() {
        let d = (t - target).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn cut_of(cuts: &[usize], sample: usize) -> usize {
    match cuts.binary_search(&sample) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANE: usize = 16;

    fn plane(value: u8) -> Vec<u8> {
        vec![value; PLANE]
    }

    /// Synthetic video: `count` samples alternating slightly around a base
    /// value, with hard jumps at `cut_at`.
    fn synthetic_planes(count: usize, cut_at: &[usize]) -> Vec<Vec<u8>> {
        let mut planes = Vec::with_capacity(count);
        let mut base: u8 = 40;
        for i in 0..count {
            if cut_at.contains(&i) {
                base = base.wrapping_add(120);
            }
            // Mild per-frame motion.
            let wobble = (i % 3) as u8;
            planes.push(plane(base + wobble));
        }
        planes
    }

    #[test]
    fn test_plane_diff() {
        assert_eq!(plane_diff(&plane(10), &plane(10)), 0.0);
        assert_eq!(plane_diff(&plane(10), &plane(30)), 20.0);
        assert_eq!(plane_diff(&[], &[]), 0.0);
    }

    #[test]
    fn test_detect_cuts_finds_hard_jump() {
        let planes = synthetic_planes(40, &[20]);
        let scores = consecutive_scores(&planes);
        let cuts = detect_cuts(&scores, 25, 3.0);
        assert!(cuts.contains(&0));
        assert!(cuts.contains(&20), "cuts were {:?}", cuts);
    }

    #[test]
    fn test_detect_cuts_no_cut_on_static_video() {
        let planes = synthetic_planes(40, &[]);
        let scores = consecutive_scores(&planes);
        let cuts = detect_cuts(&scores, 25, 3.0);
        assert_eq!(cuts, vec![0]);
    }

    #[test]
    fn test_select_keeps_first_and_last() {
        let planes = synthetic_planes(32, &[16]);
        let timestamps: Vec<f64> = (0..32).map(|i| i as f64 / 8.0).collect();
        let scores = consecutive_scores(&planes);
        let cuts = detect_cuts(&scores, 25, 3.0);
        let kept = select_frames(&planes, &timestamps, &cuts, 1, 8);

        assert_eq!(kept.first().unwrap().sample_index, 0);
        assert_eq!(kept.last().unwrap().sample_index, 31);
    }

    #[test]
    fn test_floor_fills_long_gaps() {
        // Perfectly static video: pruning would keep only the endpoints,
        // but a 4-second video at 1 fps floor needs interior frames.
        let planes: Vec<Vec<u8>> = (0..33).map(|_| plane(50)).collect();
        let timestamps: Vec<f64> = (0..33).map(|i| i as f64 / 8.0).collect();
        let kept = select_frames(&planes, &timestamps, &[0], 1, 8);

        for pair in kept.windows(2) {
            let gap = timestamps[pair[1].sample_index] - timestamps[pair[0].sample_index];
            assert!(gap <= 1.0 + 1e-9, "gap of {:.2}s exceeds floor", gap);
        }
    }

    #[test]
    fn test_ceiling_bounds_density() {
        // 12 kept frames inside one second; ceiling must prune to 8,
        // dropping lowest scores and protecting the endpoints.
        let timestamps: Vec<f64> = (0..16).map(|i| i as f64 / 16.0).collect();
        let mut kept: Vec<PlannedFrame> = (0..12)
            .map(|i| PlannedFrame {
                sample_index: i,
                cut_index: 0,
                score: i as f64,
            })
            .collect();

        enforce_ceiling(&mut kept, &timestamps, 8, 16);

        assert_eq!(kept.len(), 8);
        assert!(kept.iter().any(|f| f.sample_index == 0));
        // Lowest-score interior frames (1, 2, 3, 4) were dropped.
        assert!(!kept.iter().any(|f| f.sample_index == 1));
        assert!(!kept.iter().any(|f| f.sample_index == 4));
        assert!(kept.iter().any(|f| f.sample_index == 11));
    }

    #[test]
    fn test_single_sample_video() {
        let planes = vec![plane(1)];
        let kept = select_frames(&planes, &[0.0], &[0], 1, 8);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].sample_index, 0);
    }

    #[test]
    fn test_cut_of() {
        let cuts = vec![0, 10, 20];
        assert_eq!(cut_of(&cuts, 0), 0);
        assert_eq!(cut_of(&cuts, 5), 0);
        assert_eq!(cut_of(&cuts, 10), 1);
        assert_eq!(cut_of(&cuts, 19), 1);
        assert_eq!(cut_of(&cuts, 25), 2);
    }
}
