//! Melody matchers: one per analysis variant
//!
//! A matcher owns an immutable configuration and a feature extractor.
//! Loading, preprocessing and the short-input rule are shared through the
//! trait's provided methods; each variant decides how features are
//! aligned and how the alignment cost becomes a score.

use crate::alignment::{align, align_transposed, DistanceMetric};
use crate::audio::{load_samples, SampleBuffer};
use crate::config::MatcherConfig;
use crate::error::MatchError;
use crate::features::{
    CensChromaExtractor, FastPitchExtractor, FeatureExtractor, FeatureSequence, HarmonicChromaExtractor,
    ProbabilisticPitchExtractor, RefinedPitchExtractor,
};
use crate::preprocess::preprocess;
use crate::scoring::{LengthPenalty, Scorer};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;


/// Analysis variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// A: HPSS chroma, linear score
    HarmonicChroma,
    /// B: CENS chroma, Gaussian score
    #[default]
    RobustChroma,
    /// C: pYIN semitone contour
    ProbabilisticPitch,
    /// D: peak-picking semitone contour
    FastPitch,
    /// E: gated, smoothed, z-scored vocal-range contour
    RefinedPitch,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::HarmonicChroma,
        Variant::RobustChroma,
        Variant::ProbabilisticPitch,
        Variant::FastPitch,
        Variant::RefinedPitch,
    ];

    /// Canonical id
    pub fn id(&self) -> &'static str {
        match self {
            Variant::HarmonicChroma => "harmonic-chroma",
            Variant::RobustChroma => "robust-chroma",
            Variant::ProbabilisticPitch => "probabilistic-pitch",
            Variant::FastPitch => "fast-pitch",
            Variant::RefinedPitch => "refined-pitch",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Variant {
    type Err = MatchError;

    /// Case-insensitive; spaces and underscores count as hyphens
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '_' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "default" | "robust-chroma" | "cens" => Ok(Variant::RobustChroma),
            "harmonic-chroma" => Ok(Variant::HarmonicChroma),
            "probabilistic-pitch" | "pyin" => Ok(Variant::ProbabilisticPitch),
            "fast-pitch" | "piptrack" => Ok(Variant::FastPitch),
            "refined-pitch" => Ok(Variant::RefinedPitch),
            _ => Err(MatchError::Configuration(format!("unknown variant '{}'", s))),
        }
    }
}

/// Compares two recordings and scores their melodic similarity (0-100)
pub trait MelodyMatcher: Send + Sync {
    fn variant(&self) -> Variant;

    fn config(&self) -> &MatcherConfig;

    fn extractor(&self) -> &dyn FeatureExtractor;

    /// Score two feature sequences produced by this matcher
    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64;

    /// Decode a file at the configured sample rate
    fn load(&self, path: &Path) -> Result<SampleBuffer, MatchError> {
        load_samples(path, self.config().sample_rate)
    }

    /// Preprocess and extract
    fn extract_features(&self, buffer: &SampleBuffer) -> FeatureSequence {
        let config = self.config();
        let cleaned = preprocess(buffer, &config.preprocess, config.hop_length);
        self.extractor().extract(cleaned.samples())
    }

    fn compare(&self, query: &SampleBuffer, reference: &SampleBuffer) -> f64 {
        let query = self.extract_features(query);
        let reference = self.extract_features(reference);
        self.compare_features(&query, &reference)
    }
}

/// Build the matcher for a variant
pub fn build_matcher(variant: Variant, config: &MatcherConfig) -> Box<dyn MelodyMatcher> {
    let config = config.clone();
    match variant {
        Variant::HarmonicChroma => Box::new(HarmonicChromaMatcher::new(config)),
        Variant::RobustChroma => Box::new(RobustChromaMatcher::new(config)),
        Variant::ProbabilisticPitch => Box::new(ProbabilisticPitchMatcher::new(config)),
        Variant::FastPitch => Box::new(FastPitchMatcher::new(config)),
        Variant::RefinedPitch => Box::new(RefinedPitchMatcher::new(config)),
    }
}

/// Resolve a variant id and validate the configuration
pub fn matcher_for(variant_id: &str, config: &MatcherConfig) -> Result<Box<dyn MelodyMatcher>, MatchError> {
    let variant: Variant = variant_id.parse()?;
    config.validate()?;
    Ok(build_matcher(variant, config))
}

fn both_reliable(query: &FeatureSequence, reference: &FeatureSequence, min_frames: usize) -> bool {
    if !query.is_reliable(min_frames) || !reference.is_reliable(min_frames) {
        debug!(
            "Too little melody to compare ({} / {} frames)",
            query.len(),
            reference.len()
        );
        return false;
    }
    true
}

/// Key-invariant chroma comparison
fn score_chroma(query: &FeatureSequence, reference: &FeatureSequence, scorer: Scorer, min_frames: usize) -> f64 {
    if !both_reliable(query, reference, min_frames) {
        return 0.0;
    }
    let (FeatureSequence::Chroma(q), FeatureSequence::Chroma(r)) = (query, reference) else {
        return 0.0;
    };
    let Some((alignment, shift)) = align_transposed(q, r) else {
        return 0.0;
    };

    let cost = alignment.normalized_cost();
    let score = scorer.score(cost);
    debug!(
        "Chroma match: shift {} cost {:.4} over {} steps -> {:.2}",
        shift, cost, alignment.path_len, score
    );
    score
}

/// Contour comparison with an optional length plausibility penalty
fn score_contour(
    query: &FeatureSequence,
    reference: &FeatureSequence,
    scorer: Scorer,
    penalty: Option<LengthPenalty>,
    min_frames: usize,
) -> f64 {
    if !both_reliable(query, reference, min_frames) {
        return 0.0;
    }
    let Some(alignment) = align(query, reference, DistanceMetric::Euclidean) else {
        return 0.0;
    };

    let extra = penalty.map_or(0.0, |p| p.cost(&alignment, query.len()));
    let cost = alignment.normalized_cost() + extra;
    let score = scorer.score(cost);
    debug!(
        "Contour match: cost {:.4} (penalty {:.2}) span {} for {} frames -> {:.2}",
        cost,
        extra,
        alignment.reference_span(),
        query.len(),
        score
    );
    score
}

/// Variant A
pub struct HarmonicChromaMatcher {
    config: MatcherConfig,
    extractor: HarmonicChromaExtractor,
    scorer: Scorer,
}

impl HarmonicChromaMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            extractor: HarmonicChromaExtractor::new(&config),
            scorer: Scorer::linear(&config.scoring),
            config,
        }
    }
}

impl MelodyMatcher for HarmonicChromaMatcher {
    fn variant(&self) -> Variant {
        Variant::HarmonicChroma
    }

    fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn extractor(&self) -> &dyn FeatureExtractor {
        &self.extractor
    }

    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64 {
        score_chroma(query, reference, self.scorer, self.config.min_frames)
    }
}

/// Variant B
pub struct RobustChromaMatcher {
    config: MatcherConfig,
    extractor: CensChromaExtractor,
    scorer: Scorer,
}

impl RobustChromaMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            extractor: CensChromaExtractor::new(&config),
            scorer: Scorer::gaussian(&config.scoring),
            config,
        }
    }
}

impl MelodyMatcher for RobustChromaMatcher {
    fn variant(&self) -> Variant {
        Variant::RobustChroma
    }

    fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn extractor(&self) -> &dyn FeatureExtractor {
        &self.extractor
    }

    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64 {
        score_chroma(query, reference, self.scorer, self.config.min_frames)
    }
}

/// Variant C
pub struct ProbabilisticPitchMatcher {
    config: MatcherConfig,
    extractor: ProbabilisticPitchExtractor,
    scorer: Scorer,
}

impl ProbabilisticPitchMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            extractor: ProbabilisticPitchExtractor::new(&config),
            scorer: Scorer::semitone_ramp(&config.scoring),
            config,
        }
    }
}

impl MelodyMatcher for ProbabilisticPitchMatcher {
    fn variant(&self) -> Variant {
        Variant::ProbabilisticPitch
    }

    fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn extractor(&self) -> &dyn FeatureExtractor {
        &self.extractor
    }

    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64 {
        score_contour(query, reference, self.scorer, None, self.config.min_frames)
    }
}

/// Variant D
pub struct FastPitchMatcher {
    config: MatcherConfig,
    extractor: FastPitchExtractor,
    scorer: Scorer,
}

impl FastPitchMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            extractor: FastPitchExtractor::new(&config),
            scorer: Scorer::semitone_ramp(&config.scoring),
            config,
        }
    }
}

impl MelodyMatcher for FastPitchMatcher {
    fn variant(&self) -> Variant {
        Variant::FastPitch
    }

    fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn extractor(&self) -> &dyn FeatureExtractor {
        &self.extractor
    }

    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64 {
        score_contour(query, reference, self.scorer, None, self.config.min_frames)
    }
}

/// Variant E
pub struct RefinedPitchMatcher {
    config: MatcherConfig,
    extractor: RefinedPitchExtractor,
    scorer: Scorer,
    penalty: LengthPenalty,
}

impl RefinedPitchMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            extractor: RefinedPitchExtractor::new(&config),
            scorer: Scorer::zscore_ramp(&config.scoring),
            penalty: LengthPenalty::new(&config.scoring),
            config,
        }
    }
}

impl MelodyMatcher for RefinedPitchMatcher {
    fn variant(&self) -> Variant {
        Variant::RefinedPitch
    }

    fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn extractor(&self) -> &dyn FeatureExtractor {
        &self.extractor
    }

    fn compare_features(&self, query: &FeatureSequence, reference: &FeatureSequence) -> f64 {
        score_contour(
            query,
            reference,
            self.scorer,
            Some(self.penalty),
            self.config.min_frames,
        )
    }
}
