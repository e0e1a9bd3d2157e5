//! Alignment cost to 0-100 similarity
//!
//! Every curve is monotone non-increasing in cost. Results are clamped to
//! `[0, 100]` and rounded to two decimals.

use crate::alignment::AlignmentResult;
use crate::config::ScoringConfig;

/// Cost-to-similarity curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scorer {
    /// `(1 - cost * scale) * 100`
    Linear { scale: f64 },
    /// `100 * exp(-(cost / sigma)^gamma)`
    Gaussian { sigma: f64, gamma: f64 },
    /// `(1 - cost / threshold) * 100`
    Ramp { threshold: f64 },
}

impl Scorer {
    pub fn linear(config: &ScoringConfig) -> Self {
        Scorer::Linear {
            scale: config.chroma_linear_scale,
        }
    }

    pub fn gaussian(config: &ScoringConfig) -> Self {
        Scorer::Gaussian {
            sigma: config.cens_sigma,
            gamma: config.cens_gamma,
        }
    }

    pub fn semitone_ramp(config: &ScoringConfig) -> Self {
        Scorer::Ramp {
            threshold: config.semitone_threshold,
        }
    }

    pub fn zscore_ramp(config: &ScoringConfig) -> Self {
        Scorer::Ramp {
            threshold: config.zscore_threshold,
        }
    }

    /// Similarity for a normalized alignment cost
    pub fn score(&self, cost: f64) -> f64 {
        if !cost.is_finite() {
            return 0.0;
        }
        let cost = cost.max(0.0);
        let raw = match *self {
            Scorer::Linear { scale } => (1.0 - cost * scale) * 100.0,
            Scorer::Gaussian { sigma, gamma } => 100.0 * (-(cost / sigma).powf(gamma)).exp(),
            Scorer::Ramp { threshold } => (1.0 - cost / threshold) * 100.0,
        };
        round2(raw.clamp(0.0, 100.0))
    }
}

/// Flat cost added when the matched reference span is implausibly short
/// or long relative to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthPenalty {
    pub penalty: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl LengthPenalty {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            penalty: config.length_penalty,
            min_ratio: config.min_length_ratio,
            max_ratio: config.max_length_ratio,
        }
    }

    /// Extra cost for an alignment of a query with `query_len` frames
    pub fn cost(&self, alignment: &AlignmentResult, query_len: usize) -> f64 {
        if query_len == 0 {
            return self.penalty;
        }
        let ratio = alignment.reference_span() as f64 / query_len as f64;
        if ratio < self.min_ratio || ratio > self.max_ratio {
            self.penalty
        } else {
            0.0
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
