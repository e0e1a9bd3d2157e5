//! Melodic feature sequences and the extractors that produce them
//!
//! Two families: 12-bin chroma frames (harmony, octave-folded) and scalar
//! pitch contours. Both are one frame per analysis hop and never padded.

pub mod chroma;
pub mod piptrack;
pub mod pitch;
pub mod pyin;

use serde::{Deserialize, Serialize};

pub use chroma::{CensChromaExtractor, HarmonicChromaExtractor};
pub use pitch::{FastPitchExtractor, ProbabilisticPitchExtractor, RefinedPitchExtractor};

/// Number of pitch classes in an octave
pub const PITCH_CLASSES: usize = 12;

/// One chroma frame
pub type ChromaFrame = [f32; PITCH_CLASSES];

/// Time-ordered melodic descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "frames", rename_all = "snake_case")]
pub enum FeatureSequence {
    /// 12 x T pitch-class energies
    Chroma(Vec<ChromaFrame>),
    /// 1 x T normalized pitch values
    Contour(Vec<f32>),
}

impl FeatureSequence {
    pub fn empty_chroma() -> Self {
        FeatureSequence::Chroma(Vec::new())
    }

    pub fn empty_contour() -> Self {
        FeatureSequence::Contour(Vec::new())
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        match self {
            FeatureSequence::Chroma(frames) => frames.len(),
            FeatureSequence::Contour(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enough frames to be worth aligning
    pub fn is_reliable(&self, min_frames: usize) -> bool {
        self.len() >= min_frames
    }
}

/// Converts a preprocessed mono buffer into a feature sequence.
///
/// Implementations are deterministic and return an empty sequence when
/// the signal carries no usable melody.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, samples: &[f32]) -> FeatureSequence;
}

/// Hz to fractional MIDI note number (A4 = 69)
pub fn hz_to_midi(freq: f32) -> f32 {
    12.0 * (freq / 440.0).log2() + 69.0
}

/// Subtract the mean (key invariance for semitone contours)
pub fn zero_mean(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
    for v in values.iter_mut() {
        *v = (*v as f64 - mean) as f32;
    }
}

/// Subtract the mean and divide by the population standard deviation.
///
/// A flat series has zero spread; it is divided by 1.0 instead.
pub fn z_score(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let mut std = variance.sqrt();
    if std == 0.0 {
        std = 1.0;
    }
    for v in values.iter_mut() {
        *v = ((*v as f64 - mean) / std) as f32;
    }
}
