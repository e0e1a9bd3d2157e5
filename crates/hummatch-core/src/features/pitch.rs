//! Pitch contour extractors
//!
//! Three trackers with different cost/robustness trade-offs. All of them
//! drop unvoiced frames, so a contour is the sung melody with the rests
//! squeezed out.

use super::piptrack::piptrack;
use super::pyin::ProbabilisticYin;
use super::{hz_to_midi, z_score, zero_mean, FeatureExtractor, FeatureSequence};
use crate::config::MatcherConfig;
use crate::transform::{compute_stft, harmonic_component};

/// pYIN contour in semitones, mean removed
#[derive(Debug, Clone)]
pub struct ProbabilisticPitchExtractor {
    tracker: ProbabilisticYin,
}

impl ProbabilisticPitchExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            tracker: ProbabilisticYin::new(config),
        }
    }
}

impl FeatureExtractor for ProbabilisticPitchExtractor {
    fn extract(&self, samples: &[f32]) -> FeatureSequence {
        let mut contour: Vec<f32> = self
            .tracker
            .track(samples)
            .into_iter()
            .flatten()
            .map(hz_to_midi)
            .collect();
        zero_mean(&mut contour);
        FeatureSequence::Contour(contour)
    }
}

/// Strongest spectral peak per frame, in semitones, mean removed
#[derive(Debug, Clone)]
pub struct FastPitchExtractor {
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    fmin: f32,
    fmax: f32,
    threshold: f32,
}

impl FastPitchExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            n_fft: config.pitch.frame_length,
            hop_length: config.hop_length,
            fmin: config.pitch.fast_fmin,
            fmax: config.pitch.fast_fmax,
            threshold: config.pitch.piptrack_threshold,
        }
    }
}

impl FeatureExtractor for FastPitchExtractor {
    fn extract(&self, samples: &[f32]) -> FeatureSequence {
        let spec = compute_stft(samples, self.sample_rate, self.n_fft, self.hop_length);
        let peaks = piptrack(&spec, self.fmin, self.fmax, self.threshold);

        let mut contour: Vec<f32> = peaks
            .strongest()
            .into_iter()
            .filter(|&(pitch, _)| pitch > 0.0)
            .map(|(pitch, _)| hz_to_midi(pitch))
            .collect();
        zero_mean(&mut contour);
        FeatureSequence::Contour(contour)
    }
}

/// Harmonic-only peak tracking in the vocal range, gated, smoothed and
/// z-scored.
///
/// Z-scoring matches a flat hum against an expressive vocal line better
/// than plain mean removal. Values stay in Hz before normalization.
#[derive(Debug, Clone)]
pub struct RefinedPitchExtractor {
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    hpss_kernel: usize,
    hpss_power: f32,
    fmin: f32,
    fmax: f32,
    threshold: f32,
    gate: f32,
    median_window: usize,
    min_frames: usize,
}

impl RefinedPitchExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            n_fft: config.pitch.frame_length,
            hop_length: config.hop_length,
            hpss_kernel: config.chroma.hpss_kernel,
            hpss_power: config.chroma.hpss_power,
            fmin: config.pitch.refined_fmin,
            fmax: config.pitch.refined_fmax,
            threshold: config.pitch.piptrack_threshold,
            gate: config.pitch.refined_gate,
            median_window: config.pitch.refined_median_window,
            min_frames: config.min_frames,
        }
    }
}

impl FeatureExtractor for RefinedPitchExtractor {
    fn extract(&self, samples: &[f32]) -> FeatureSequence {
        let spec = compute_stft(samples, self.sample_rate, self.n_fft, self.hop_length);
        let harmonic = harmonic_component(&spec, self.hpss_kernel, self.hpss_power);
        let peaks = piptrack(&harmonic, self.fmin, self.fmax, self.threshold);

        let gate = peaks.max_magnitude() * self.gate;

        let mut contour: Vec<f32> = peaks
            .strongest()
            .into_iter()
            .map(|(pitch, mag)| if pitch > 0.0 && mag > gate { pitch } else { 0.0 })
            .collect();

        if contour.len() > self.median_window {
            contour = median_filter_zero(&contour, self.median_window);
        }

        let contour = trim_zeros(&contour);
        if contour.len() < self.min_frames {
            return FeatureSequence::empty_contour();
        }
        let mut voiced: Vec<f32> = contour.iter().cloned().filter(|&p| p > 0.0).collect();
        if voiced.len() < self.min_frames {
            return FeatureSequence::empty_contour();
        }

        z_score(&mut voiced);
        FeatureSequence::Contour(voiced)
    }
}

/// Sliding median treating samples outside the series as zero
fn median_filter_zero(values: &[f32], kernel: usize) -> Vec<f32> {
    let half = (kernel / 2) as isize;
    let n = values.len() as isize;
    let mut window = Vec::with_capacity(kernel);
    (0..n)
        .map(|centre| {
            window.clear();
            for i in centre - half..=centre + half {
                window.push(if i < 0 || i >= n { 0.0 } else { values[i as usize] });
            }
            window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            window[window.len() / 2]
        })
        .collect()
}

/// Strip leading and trailing zeros
fn trim_zeros(values: &[f32]) -> &[f32] {
    let start = values.iter().position(|&v| v != 0.0).unwrap_or(values.len());
    let end = values.iter().rposition(|&v| v != 0.0).map_or(start, |i| i + 1);
    &values[start..end]
}
