//! Harmonic/percussive separation by median filtering
//!
//! Sustained (harmonic) energy is smooth along time, transients are smooth
//! along frequency. Median filtering the magnitude spectrogram in each
//! direction and soft-masking keeps the harmonic part.

use super::Spectrogram;
use std::cmp::Ordering;

/// Harmonic magnitudes of a spectrogram (same shape)
pub fn harmonic_component(spectrogram: &Spectrogram, kernel: usize, power: f32) -> Spectrogram {
    let frames = spectrogram.num_frames;
    let bins = spectrogram.num_bins;
    if frames == 0 || bins == 0 {
        return spectrogram.clone();
    }

    // Harmonic estimate: median across time for each bin
    let mut harmonic = vec![vec![0.0f32; bins]; frames];
    let mut column = vec![0.0f32; frames];
    for bin in 0..bins {
        for (t, value) in column.iter_mut().enumerate() {
            *value = spectrogram.magnitudes[t][bin];
        }
        let smoothed = median_filter_reflect(&column, kernel);
        for (t, value) in smoothed.into_iter().enumerate() {
            harmonic[t][bin] = value;
        }
    }

    // Percussive estimate: median across frequency for each frame, then mask
    let magnitudes = spectrogram
        .magnitudes
        .iter()
        .zip(harmonic.iter())
        .map(|(frame, harm)| {
            let percussive = median_filter_reflect(frame, kernel);
            frame
                .iter()
                .zip(harm.iter())
                .zip(percussive.iter())
                .map(|((&s, &h), &p)| s * soft_mask(h, p, power))
                .collect()
        })
        .collect();

    Spectrogram {
        magnitudes,
        ..spectrogram.clone_shape()
    }
}

impl Spectrogram {
    fn clone_shape(&self) -> Spectrogram {
        Spectrogram {
            magnitudes: Vec::new(),
            num_frames: self.num_frames,
            num_bins: self.num_bins,
            n_fft: self.n_fft,
            sample_rate: self.sample_rate,
        }
    }
}

/// Wiener-style mask `x^p / (x^p + r^p)`, zero where both vanish
fn soft_mask(x: f32, reference: f32, power: f32) -> f32 {
    let scale = x.max(reference);
    if scale <= f32::MIN_POSITIVE {
        return 0.0;
    }
    let xp = (x / scale).powf(power);
    let rp = (reference / scale).powf(power);
    xp / (xp + rp)
}

/// Sliding median with mirrored edges (`d c b a | a b c d | d c b a`)
pub fn median_filter_reflect(values: &[f32], kernel: usize) -> Vec<f32> {
    let n = values.len();
    if n == 0 || kernel <= 1 {
        return values.to_vec();
    }

    let half = (kernel / 2) as isize;
    let mut scratch = Vec::with_capacity(kernel);
    (0..n as isize)
        .map(|centre| {
            scratch.clear();
            for offset in -half..(kernel as isize - half) {
                scratch.push(values[reflect_index(centre + offset, n)]);
            }
            let mid = scratch.len() / 2;
            let (_, median, _) = scratch
                .select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            *median
        })
        .collect()
}

fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}
