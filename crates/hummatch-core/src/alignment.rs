//! Subsequence dynamic time warping
//!
//! The query must be consumed completely but may start and end anywhere
//! in the reference, so a short hum can lock onto one passage of a song.

use crate::features::{ChromaFrame, FeatureSequence, PITCH_CLASSES};
use log::trace;

/// Frame-to-frame distance used to fill the cost matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; 1 when exactly one vector is zero, 0 when both are
    Cosine,
    /// Euclidean; `|a - b|` for scalar contours
    Euclidean,
}

/// Outcome of one alignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    /// Accumulated cost at the path end
    pub total_cost: f64,
    /// Number of cells on the warping path
    pub path_len: usize,
    /// First and last reference frame touched by the path
    pub ref_start: usize,
    pub ref_end: usize,
}

impl AlignmentResult {
    /// Total cost divided by path length
    pub fn normalized_cost(&self) -> f64 {
        if self.path_len == 0 {
            return f64::INFINITY;
        }
        self.total_cost / self.path_len as f64
    }

    /// Reference frames covered by the match (`max - min` index)
    pub fn reference_span(&self) -> usize {
        self.ref_end - self.ref_start
    }
}

impl DistanceMetric {
    /// Natural metric for a feature kind
    pub fn for_sequence(sequence: &FeatureSequence) -> Self {
        match sequence {
            FeatureSequence::Chroma(_) => DistanceMetric::Cosine,
            FeatureSequence::Contour(_) => DistanceMetric::Euclidean,
        }
    }
}

/// Align two sequences of the same kind.
///
/// Returns `None` for empty inputs or mismatched kinds.
pub fn align(query: &FeatureSequence, reference: &FeatureSequence, metric: DistanceMetric) -> Option<AlignmentResult> {
    match (query, reference) {
        (FeatureSequence::Chroma(q), FeatureSequence::Chroma(r)) => {
            subsequence_dtw(q, r, |a, b| frame_distance(metric, a, b))
        }
        (FeatureSequence::Contour(q), FeatureSequence::Contour(r)) => {
            subsequence_dtw(q, r, |a, b| scalar_distance(metric, *a, *b))
        }
        _ => None,
    }
}

/// Try all 12 rotations of the query's pitch classes; keep the cheapest.
///
/// Returns the best alignment and the rotation that produced it.
pub fn align_transposed(query: &[ChromaFrame], reference: &[ChromaFrame]) -> Option<(AlignmentResult, usize)> {
    let mut best: Option<(AlignmentResult, usize)> = None;
    for shift in 0..PITCH_CLASSES {
        let rotated: Vec<ChromaFrame> = query.iter().map(|frame| rotate(frame, shift)).collect();
        let Some(result) = subsequence_dtw(&rotated, reference, |a, b| {
            frame_distance(DistanceMetric::Cosine, a, b)
        }) else {
            continue;
        };
        trace!("shift {}: normalized cost {:.4}", shift, result.normalized_cost());

        if best.map_or(true, |(b, _)| result.normalized_cost() < b.normalized_cost()) {
            best = Some((result, shift));
        }
    }
    best
}

/// Rotate pitch classes upward: `out[i] = frame[(i - shift) mod 12]`
pub fn rotate(frame: &ChromaFrame, shift: usize) -> ChromaFrame {
    let mut out = [0.0f32; PITCH_CLASSES];
    for (i, value) in out.iter_mut().enumerate() {
        *value = frame[(i + PITCH_CLASSES - shift % PITCH_CLASSES) % PITCH_CLASSES];
    }
    out
}

/// Distance between two chroma frames
pub fn frame_distance(metric: DistanceMetric, a: &ChromaFrame, b: &ChromaFrame) -> f64 {
    match metric {
        DistanceMetric::Cosine => {
            let dot: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x as f64 * y as f64).sum();
            let na = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
            let nb = b.iter().map(|&y| (y as f64).powi(2)).sum::<f64>().sqrt();
            match (na > 0.0, nb > 0.0) {
                (false, false) => 0.0,
                (true, true) => (1.0 - dot / (na * nb)).max(0.0),
                _ => 1.0,
            }
        }
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
            .sum::<f64>()
            .sqrt(),
    }
}

/// Distance between two contour values
pub fn scalar_distance(metric: DistanceMetric, a: f32, b: f32) -> f64 {
    match metric {
        DistanceMetric::Euclidean => (a as f64 - b as f64).abs(),
        // A one-dimensional cosine only sees the signs
        DistanceMetric::Cosine => match (a == 0.0, b == 0.0) {
            (true, true) => 0.0,
            (false, false) => 1.0 - a.signum() as f64 * b.signum() as f64,
            _ => 1.0,
        },
    }
}

/// Core recurrence over a row-major `n x m` accumulated-cost matrix
fn subsequence_dtw<T>(query: &[T], reference: &[T], distance: impl Fn(&T, &T) -> f64) -> Option<AlignmentResult> {
    let n = query.len();
    let m = reference.len();
    if n == 0 || m == 0 {
        return None;
    }

    let mut acc = vec![0.0f64; n * m];
    for (j, r) in reference.iter().enumerate() {
        acc[j] = distance(&query[0], r);
    }
    for i in 1..n {
        let row = i * m;
        let prev = (i - 1) * m;
        acc[row] = acc[prev] + distance(&query[i], &reference[0]);
        for j in 1..m {
            let best = acc[prev + j - 1].min(acc[prev + j]).min(acc[row + j - 1]);
            acc[row + j] = distance(&query[i], &reference[j]) + best;
        }
    }

    let last = (n - 1) * m;
    let mut end = 0;
    for j in 1..m {
        if acc[last + j] < acc[last + end] {
            end = j;
        }
    }

    // Backtrack to row 0; ties prefer the diagonal, then the reference step
    let (mut i, mut j) = (n - 1, end);
    let mut path_len = 1;
    let (mut ref_start, ref_end) = (end, end);
    while i > 0 {
        let up = acc[(i - 1) * m + j];
        (i, j) = if j == 0 {
            (i - 1, j)
        } else {
            let diagonal = acc[(i - 1) * m + j - 1];
            let left = acc[i * m + j - 1];
            if diagonal <= left && diagonal <= up {
                (i - 1, j - 1)
            } else if left <= up {
                (i, j - 1)
            } else {
                (i - 1, j)
            }
        };
        ref_start = ref_start.min(j);
        path_len += 1;
    }

    Some(AlignmentResult {
        total_cost: acc[last + end],
        path_len,
        ref_start,
        ref_end,
    })
}
