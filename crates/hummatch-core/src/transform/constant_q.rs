//! Log-frequency (constant-Q) mapping of STFT magnitudes
//!
//! Each constant-Q bin reads the FFT magnitude at its centre frequency
//! (linear interpolation between FFT bins) or, where its band spans
//! several FFT bins, the strongest bin inside the band.

#[derive(Debug, Clone)]
struct CqBin {
    /// Fractional FFT bin position of the centre frequency
    position: f32,
    /// FFT bins covered by the band, `lo..hi`
    lo: usize,
    hi: usize,
}

/// Precomputed mapping from FFT bins to constant-Q bins
#[derive(Debug, Clone)]
pub struct ConstantQMap {
    bins: Vec<CqBin>,
    bins_per_octave: u32,
}

impl ConstantQMap {
    pub fn new(sample_rate: u32, n_fft: usize, fmin: f32, n_octaves: u32, bins_per_octave: u32) -> Self {
        let num_bins = (n_octaves * bins_per_octave) as usize;
        let hz_per_bin = sample_rate as f32 / n_fft as f32;
        let half_band = 2f32.powf(0.5 / bins_per_octave as f32);
        let max_fft_bin = n_fft / 2;

        let bins = (0..num_bins)
            .map(|k| {
                let freq = fmin * 2f32.powf(k as f32 / bins_per_octave as f32);
                let position = freq / hz_per_bin;
                let lo = (position / half_band).ceil() as usize;
                let hi = ((position * half_band).ceil() as usize).min(max_fft_bin + 1);
                CqBin { position, lo, hi }
            })
            .collect();

        Self {
            bins,
            bins_per_octave,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn bins_per_octave(&self) -> u32 {
        self.bins_per_octave
    }

    /// Map one STFT frame to constant-Q magnitudes
    pub fn map_frame(&self, frame: &[f32]) -> Vec<f32> {
        self.bins
            .iter()
            .map(|bin| {
                let base = bin.position.floor() as usize;
                let frac = bin.position - base as f32;
                let interpolated = match (frame.get(base), frame.get(base + 1)) {
                    (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                    (Some(&a), None) => a,
                    _ => 0.0,
                };
                let hi = bin.hi.min(frame.len());
                let band_peak = if bin.lo < hi {
                    frame[bin.lo..hi].iter().cloned().fold(0.0f32, f32::max)
                } else {
                    0.0
                };
                interpolated.max(band_peak)
            })
            .collect()
    }

    /// Highest frequency any constant-Q band reads (Hz)
    pub fn max_frequency(&self, sample_rate: u32, n_fft: usize) -> f32 {
        self.bins
            .last()
            .map(|bin| bin.hi as f32 * sample_rate as f32 / n_fft as f32)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::compute_stft;
    use crate::test_support::{tone, A4, SR};

    #[test]
    fn test_num_bins_calculation() {
        let map = ConstantQMap::new(SR, 4096, 65.41, 6, 36);
        assert_eq!(map.num_bins(), 216);
        assert_eq!(map.bins_per_octave(), 36);
    }

    #[test]
    fn test_tone_lands_on_its_note() {
        let fmin = 65.406_39;
        let map = ConstantQMap::new(SR, 4096, fmin, 6, 36);
        let spec = compute_stft(&tone(A4, SR, 0.5), SR, 4096, 512);
        let cq = map.map_frame(&spec.magnitudes[spec.num_frames / 2]);

        let peak = cq
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        // A4 is 33 semitones above C2 -> bin 99 at 3 bins per semitone
        assert!((peak as i32 - 99).abs() <= 1, "peak at {}", peak);
    }
}
