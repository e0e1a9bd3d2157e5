//! Peak-picking pitch tracker
//!
//! Finds local maxima along frequency in each STFT frame, refines them
//! by parabolic interpolation and keeps those above a per-frame relative
//! threshold inside `[fmin, fmax)`.

use crate::transform::Spectrogram;

/// Instantaneous pitch candidates, `[frame][bin]`; zero where no peak
#[derive(Debug, Clone)]
pub struct PitchPeaks {
    pub pitches: Vec<Vec<f32>>,
    pub magnitudes: Vec<Vec<f32>>,
}

impl PitchPeaks {
    /// Strongest candidate per frame as `(pitch_hz, magnitude)`.
    ///
    /// Frames without any peak yield `(0.0, 0.0)`.
    pub fn strongest(&self) -> Vec<(f32, f32)> {
        self.pitches
            .iter()
            .zip(self.magnitudes.iter())
            .map(|(pitches, mags)| {
                let mut best = 0usize;
                for (i, &m) in mags.iter().enumerate() {
                    if m > mags[best] {
                        best = i;
                    }
                }
                match (pitches.get(best), mags.get(best)) {
                    (Some(&p), Some(&m)) => (p, m),
                    _ => (0.0, 0.0),
                }
            })
            .collect()
    }

    /// Largest peak magnitude over the whole clip
    pub fn max_magnitude(&self) -> f32 {
        self.magnitudes
            .iter()
            .flat_map(|frame| frame.iter())
            .cloned()
            .fold(0.0f32, f32::max)
    }
}

/// Track pitch peaks in a magnitude spectrogram
pub fn piptrack(spectrogram: &Spectrogram, fmin: f32, fmax: f32, threshold: f32) -> PitchPeaks {
    let fmax = fmax.min(spectrogram.sample_rate as f32 / 2.0);
    let hz_per_bin = spectrogram.sample_rate as f32 / spectrogram.n_fft as f32;

    let mut pitches = Vec::with_capacity(spectrogram.num_frames);
    let mut magnitudes = Vec::with_capacity(spectrogram.num_frames);

    for frame in &spectrogram.magnitudes {
        let bins = frame.len();
        let mut frame_pitches = vec![0.0f32; bins];
        let mut frame_mags = vec![0.0f32; bins];

        let reference = threshold * frame.iter().cloned().fold(0.0f32, f32::max);

        // First and last bins have no neighbours to interpolate with
        for i in 1..bins.saturating_sub(1) {
            let freq = i as f32 * hz_per_bin;
            if freq < fmin || freq >= fmax {
                continue;
            }
            let (prev, value, next) = (frame[i - 1], frame[i], frame[i + 1]);
            if !(prev < value && next <= value && value > reference) {
                continue;
            }

            let avg = 0.5 * (next - prev);
            let mut curvature = 2.0 * value - next - prev;
            if curvature.abs() < f32::MIN_POSITIVE {
                curvature += 1.0;
            }
            let shift = avg / curvature;

            frame_pitches[i] = (i as f32 + shift) * hz_per_bin;
            frame_mags[i] = value + 0.5 * avg * shift;
        }

        pitches.push(frame_pitches);
        magnitudes.push(frame_mags);
    }

    PitchPeaks {
        pitches,
        magnitudes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{silence, tone, A4, SR};
    use crate::transform::compute_stft;

    #[test]
    fn test_tone_pitch_is_interpolated() {
        let spec = compute_stft(&tone(A4, SR, 0.5), SR, 2048, 512);
        let peaks = piptrack(&spec, 150.0, 4000.0, 0.1);
        let strongest = peaks.strongest();
        let (pitch, mag) = strongest[strongest.len() / 2];
        assert!(mag > 0.0);
        assert!(peaks.max_magnitude() >= mag);
        let loudest = strongest.iter().map(|&(_, m)| m).fold(0.0f32, f32::max);
        assert_eq!(peaks.max_magnitude(), loudest);
        // Bin spacing is ~10.8 Hz; interpolation gets well inside it
        assert!((pitch - A4).abs() < 3.0, "pitch {}", pitch);
    }

    #[test]
    fn test_out_of_range_peaks_are_ignored() {
        let spec = compute_stft(&tone(A4, SR, 0.5), SR, 2048, 512);
        let peaks = piptrack(&spec, 1000.0, 4000.0, 0.1);
        let (_, mag) = peaks.strongest()[peaks.pitches.len() / 2];
        assert_eq!(mag, 0.0);
    }

    #[test]
    fn test_silence_has_no_peaks() {
        let spec = compute_stft(&silence(SR, 0.3), SR, 2048, 512);
        let peaks = piptrack(&spec, 150.0, 4000.0, 0.1);
        assert!(peaks.strongest().iter().all(|&(p, m)| p == 0.0 && m == 0.0));
        assert_eq!(peaks.max_magnitude(), 0.0);
    }
}
