//! Signal cleanup ahead of feature extraction
//!
//! Trims silence from both ends and removes handling rumble with a
//! zero-phase Butterworth high-pass, so filtering never shifts the
//! melody in time relative to the reference.

use crate::audio::SampleBuffer;
use crate::config::PreprocessConfig;

/// Trim + high-pass a buffer. Returns a new buffer at the same rate.
pub fn preprocess(buffer: &SampleBuffer, config: &PreprocessConfig, hop_length: usize) -> SampleBuffer {
    if !config.enabled || buffer.is_empty() {
        return buffer.clone();
    }

    let trimmed = trim_silence(
        buffer.samples(),
        config.trim_top_db,
        config.trim_frame_length,
        hop_length,
    );
    let filter = Biquad::butterworth_highpass(config.highpass_cutoff_hz as f64, buffer.sample_rate() as f64);
    let filtered = filter.filtfilt(trimmed);

    log::trace!(
        "Preprocessed {} -> {} samples",
        buffer.len(),
        filtered.len()
    );

    SampleBuffer::new(filtered, buffer.sample_rate())
}

/// Strip leading/trailing frames more than `top_db` below the loudest frame.
///
/// Falls back to the untouched signal when nothing would survive.
pub fn trim_silence(samples: &[f32], top_db: f32, frame_length: usize, hop_length: usize) -> &[f32] {
    let energies = frame_mean_square(samples, frame_length, hop_length);
    let peak = energies.iter().cloned().fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return samples;
    }

    let floor = peak * 10f64.powf(-(top_db as f64) / 10.0);
    let first = energies.iter().position(|&e| e > floor);
    let last = energies.iter().rposition(|&e| e > floor);

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * hop_length).min(samples.len());
            let end = ((last + 1) * hop_length).min(samples.len());
            if start >= end {
                samples
            } else {
                &samples[start..end]
            }
        }
        _ => samples,
    }
}

/// Mean square per centred, zero-padded frame
fn frame_mean_square(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    if samples.is_empty() || hop_length == 0 {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += s as f64 * s as f64;
        prefix.push(acc);
    }

    let half = frame_length / 2;
    let num_frames = 1 + samples.len() / hop_length;
    (0..num_frames)
        .map(|t| {
            let centre = t * hop_length;
            let start = centre.saturating_sub(half).min(samples.len());
            let end = (centre + frame_length - half).min(samples.len());
            (prefix[end] - prefix[start]) / frame_length as f64
        })
        .collect()
}

/// Second-order IIR section in transposed direct form II
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// Bilinear-transform Butterworth high-pass (Q = 1/sqrt(2))
    fn butterworth_highpass(cutoff_hz: f64, sample_rate: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff_hz / sample_rate).tan();
        let sqrt2 = std::f64::consts::SQRT_2;
        let norm = 1.0 / (1.0 + sqrt2 * k + k * k);
        Self {
            b: [norm, -2.0 * norm, norm],
            a: [2.0 * (k * k - 1.0) * norm, (1.0 - sqrt2 * k + k * k) * norm],
        }
    }

    /// Filter state that makes a constant input of 1.0 pass without a transient
    fn steady_state(&self) -> [f64; 2] {
        let gain = (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1]);
        [gain - self.b[0], self.b[2] - self.a[1] * gain]
    }

    fn run(&self, signal: &mut [f64], initial: f64) {
        let zi = self.steady_state();
        let mut z1 = zi[0] * initial;
        let mut z2 = zi[1] * initial;
        for x in signal.iter_mut() {
            let input = *x;
            let output = self.b[0] * input + z1;
            z1 = self.b[1] * input - self.a[0] * output + z2;
            z2 = self.b[2] * input - self.a[1] * output;
            *x = output;
        }
    }

    /// Forward-backward filtering with odd-extension padding
    fn filtfilt(&self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = 9.min(n - 1);

        let x: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let first = x[0];
        let last = x[n - 1];

        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(&x);
        ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));

        let start = ext[0];
        self.run(&mut ext, start);
        ext.reverse();
        let start = ext[0];
        self.run(&mut ext, start);
        ext.reverse();

        ext[pad..pad + n].iter().map(|&v| v as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{silence, tone};

    const SR: u32 = 22050;

    #[test]
    fn test_trim_removes_padding() {
        let mut signal = silence(SR, 1.0);
        signal.extend(tone(440.0, SR, 1.0));
        signal.extend(silence(SR, 1.0));

        let trimmed = trim_silence(&signal, 60.0, 2048, 512);
        let duration = trimmed.len() as f32 / SR as f32;
        assert!(duration > 0.9 && duration < 1.2, "trimmed to {}s", duration);
    }

    #[test]
    fn test_trim_keeps_all_silent_signal() {
        let signal = silence(SR, 0.5);
        assert_eq!(trim_silence(&signal, 60.0, 2048, 512).len(), signal.len());
    }

    #[test]
    fn test_highpass_removes_rumble_keeps_voice() {
        let filter = Biquad::butterworth_highpass(100.0, SR as f64);

        let rumble = tone(20.0, SR, 2.0);
        let voice = tone(440.0, SR, 2.0);
        let rumble_out = filter.filtfilt(&rumble);
        let voice_out = filter.filtfilt(&voice);

        let rms = |s: &[f32]| (s.iter().map(|v| v * v).sum::<f32>() / s.len() as f32).sqrt();
        let mid = |s: &[f32]| s[SR as usize / 2..s.len() - SR as usize / 2].to_vec();
        assert!(rms(&mid(&rumble_out)) < 0.1 * rms(&mid(&rumble)));
        assert!(rms(&mid(&voice_out)) > 0.95 * rms(&mid(&voice)));
    }

    #[test]
    fn test_filtfilt_is_zero_phase() {
        let filter = Biquad::butterworth_highpass(100.0, SR as f64);
        let voice = tone(300.0, SR, 1.0);
        let out = filter.filtfilt(&voice);

        // A phase shift would move the zero crossings; compare sample-wise mid-signal
        let max_err = (5000..15000)
            .map(|i| (out[i] - voice[i]).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 0.05, "max error {}", max_err);
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let mut signal = silence(SR, 0.3);
        signal.extend(tone(330.0, SR, 0.5));
        let buffer = SampleBuffer::new(signal, SR);
        let config = PreprocessConfig::default();
        assert_eq!(preprocess(&buffer, &config, 512), preprocess(&buffer, &config, 512));
    }
}
