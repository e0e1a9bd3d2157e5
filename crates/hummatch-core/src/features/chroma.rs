//! Chroma extraction: harmonic chroma and CENS
//!
//! Both start from the harmonic part of the signal, mapped onto a
//! constant-Q axis starting on a C and folded into 12 pitch classes.

use super::{ChromaFrame, FeatureExtractor, FeatureSequence, PITCH_CLASSES};
use crate::config::{ChromaConfig, MatcherConfig};
use crate::transform::{compute_stft, harmonic_component, ConstantQMap};

/// CENS quantisation steps, each crossing adds 0.25
const QUANT_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];
const QUANT_WEIGHT: f32 = 0.25;

/// Shared front end: HPSS -> constant-Q -> pitch-class folding
#[derive(Debug, Clone)]
struct ChromaAnalyzer {
    sample_rate: u32,
    hop_length: usize,
    n_fft: usize,
    hpss_kernel: usize,
    hpss_power: f32,
    map: ConstantQMap,
}

impl ChromaAnalyzer {
    fn new(config: &MatcherConfig) -> Self {
        let chroma: &ChromaConfig = &config.chroma;
        Self {
            sample_rate: config.sample_rate,
            hop_length: config.hop_length,
            n_fft: chroma.n_fft,
            hpss_kernel: chroma.hpss_kernel,
            hpss_power: chroma.hpss_power,
            map: ConstantQMap::new(
                config.sample_rate,
                chroma.n_fft,
                chroma.fmin,
                chroma.n_octaves,
                chroma.bins_per_octave,
            ),
        }
    }

    /// Unnormalized pitch-class energies, `None` when the signal is silent
    fn raw_chroma(&self, samples: &[f32]) -> Option<Vec<ChromaFrame>> {
        let mut spec = compute_stft(samples, self.sample_rate, self.n_fft, self.hop_length);
        if spec.num_frames == 0 {
            return None;
        }
        spec.truncate_above(self.map.max_frequency(self.sample_rate, self.n_fft));

        let harmonic = harmonic_component(&spec, self.hpss_kernel, self.hpss_power);
        let bins_per_class = (self.map.bins_per_octave() as usize / PITCH_CLASSES).max(1);
        let offset = bins_per_class / 2;

        let frames: Vec<ChromaFrame> = harmonic
            .magnitudes
            .iter()
            .map(|frame| {
                let mut chroma = [0.0f32; PITCH_CLASSES];
                for (k, value) in self.map.map_frame(frame).into_iter().enumerate() {
                    let class = ((k + offset) / bins_per_class) % PITCH_CLASSES;
                    chroma[class] += value;
                }
                chroma
            })
            .collect();

        let energy: f32 = frames.iter().flat_map(|f| f.iter()).sum();
        if energy <= f32::MIN_POSITIVE {
            return None;
        }
        Some(frames)
    }
}

/// Harmonic chroma with per-frame L2 normalization
#[derive(Debug, Clone)]
pub struct HarmonicChromaExtractor {
    analyzer: ChromaAnalyzer,
}

impl HarmonicChromaExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            analyzer: ChromaAnalyzer::new(config),
        }
    }
}

impl FeatureExtractor for HarmonicChromaExtractor {
    fn extract(&self, samples: &[f32]) -> FeatureSequence {
        match self.analyzer.raw_chroma(samples) {
            Some(mut frames) => {
                frames.iter_mut().for_each(normalize_l2);
                FeatureSequence::Chroma(frames)
            }
            None => FeatureSequence::empty_chroma(),
        }
    }
}

/// Chroma Energy Normalized Statistics.
///
/// Quantising and smoothing over ~0.5 s makes the frames tolerant of
/// sloppy rhythm and articulation, which is what hummed queries have.
#[derive(Debug, Clone)]
pub struct CensChromaExtractor {
    analyzer: ChromaAnalyzer,
    smoothing: usize,
}

impl CensChromaExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            analyzer: ChromaAnalyzer::new(config),
            smoothing: config.chroma.cens_smoothing,
        }
    }
}

impl FeatureExtractor for CensChromaExtractor {
    fn extract(&self, samples: &[f32]) -> FeatureSequence {
        let Some(mut frames) = self.analyzer.raw_chroma(samples) else {
            return FeatureSequence::empty_chroma();
        };

        for frame in frames.iter_mut() {
            normalize_l1(frame);
            quantize(frame);
        }
        let mut smoothed = smooth_over_time(&frames, self.smoothing);
        smoothed.iter_mut().for_each(normalize_l2);
        FeatureSequence::Chroma(smoothed)
    }
}

fn normalize_l1(frame: &mut ChromaFrame) {
    let norm: f32 = frame.iter().map(|v| v.abs()).sum();
    if norm > f32::MIN_POSITIVE {
        frame.iter_mut().for_each(|v| *v /= norm);
    }
}

fn normalize_l2(frame: &mut ChromaFrame) {
    let norm = frame.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::MIN_POSITIVE {
        frame.iter_mut().for_each(|v| *v /= norm);
    } else {
        *frame = [0.0; PITCH_CLASSES];
    }
}

fn quantize(frame: &mut ChromaFrame) {
    for v in frame.iter_mut() {
        let level = QUANT_STEPS.iter().filter(|&&step| *v > step).count();
        *v = level as f32 * QUANT_WEIGHT;
    }
}

/// Convolve each pitch class along time with a normalized Hann window,
/// zero outside the sequence, output aligned with the input.
fn smooth_over_time(frames: &[ChromaFrame], length: usize) -> Vec<ChromaFrame> {
    // Symmetric Hann of length + 2 has zero end points; drop them
    let denom = (length + 1) as f32;
    let window: Vec<f32> = (1..=length)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect();
    let total: f32 = window.iter().sum();
    let centre = (length / 2) as isize;

    (0..frames.len() as isize)
        .map(|t| {
            let mut out = [0.0f32; PITCH_CLASSES];
            for (k, w) in window.iter().enumerate() {
                let src = t + k as isize - centre;
                if src < 0 || src >= frames.len() as isize {
                    continue;
                }
                let frame = &frames[src as usize];
                for c in 0..PITCH_CLASSES {
                    out[c] += w / total * frame[c];
                }
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{melody, silence, tone, C4, E4, G4, SR};

    fn dominant_class(frame: &ChromaFrame) -> usize {
        frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_quantize_levels() {
        let mut frame = [0.0f32; 12];
        frame[0] = 0.5;
        frame[1] = 0.25;
        frame[2] = 0.15;
        frame[3] = 0.07;
        frame[4] = 0.03;
        quantize(&mut frame);
        assert_eq!(&frame[..5], &[1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_smoothing_preserves_constant_interior() {
        let frames = vec![[1.0f32; 12]; 60];
        let smoothed = smooth_over_time(&frames, 21);
        assert!((smoothed[30][0] - 1.0).abs() < 1e-5);
        // Edges see zeros outside the sequence
        assert!(smoothed[0][0] < 0.75);
    }

    #[test]
    fn test_harmonic_chroma_finds_pitch_class() {
        let config = MatcherConfig::default();
        let extractor = HarmonicChromaExtractor::new(&config);
        let FeatureSequence::Chroma(frames) = extractor.extract(&tone(G4, SR, 1.0)) else {
            panic!("expected chroma");
        };
        assert_eq!(frames.len(), 1 + SR as usize / 512);
        assert_eq!(dominant_class(&frames[frames.len() / 2]), 7);

        let norm: f32 = frames[frames.len() / 2].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_cens_follows_melody() {
        let config = MatcherConfig::default();
        let extractor = CensChromaExtractor::new(&config);
        let signal = melody(&[(C4, 1.0), (E4, 1.0)], SR);
        let FeatureSequence::Chroma(frames) = extractor.extract(&signal) else {
            panic!("expected chroma");
        };
        let frames_per_second = SR as usize / 512;
        assert_eq!(dominant_class(&frames[frames_per_second / 2]), 0);
        assert_eq!(dominant_class(&frames[frames_per_second + frames_per_second / 2]), 4);
    }

    #[test]
    fn test_silence_yields_empty_chroma() {
        let config = MatcherConfig::default();
        let silent = silence(SR, 1.0);
        assert!(HarmonicChromaExtractor::new(&config).extract(&silent).is_empty());
        assert!(CensChromaExtractor::new(&config).extract(&silent).is_empty());
        assert!(CensChromaExtractor::new(&config).extract(&[]).is_empty());
    }
}
