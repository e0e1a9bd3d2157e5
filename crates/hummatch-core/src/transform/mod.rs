//! Spectral transforms
//!
//! Short-time Fourier magnitudes with centred frames, plus the
//! log-frequency mapping and harmonic/percussive separation built on them.

mod constant_q;
mod hpss;

pub use constant_q::ConstantQMap;
pub use hpss::{harmonic_component, median_filter_reflect};

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Magnitude spectrogram
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Magnitude values [time_frame][frequency_bin]
    pub magnitudes: Vec<Vec<f32>>,
    /// Number of time frames
    pub num_frames: usize,
    /// Number of frequency bins kept (at most n_fft/2 + 1)
    pub num_bins: usize,
    pub n_fft: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// Centre frequency of an FFT bin (Hz)
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Drop bins above `max_freq` to save work in later stages
    pub fn truncate_above(&mut self, max_freq: f32) {
        let keep = ((max_freq * self.n_fft as f32 / self.sample_rate as f32).ceil() as usize + 2)
            .min(self.num_bins);
        for frame in &mut self.magnitudes {
            frame.truncate(keep);
        }
        self.num_bins = keep;
    }
}

/// Compute a centred STFT magnitude spectrogram.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t`
/// is centred on sample `t * hop`; there are `1 + len / hop` frames.
pub fn compute_stft(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Spectrogram {
    let num_bins = n_fft / 2 + 1;
    if samples.is_empty() || hop == 0 {
        return Spectrogram {
            magnitudes: Vec::new(),
            num_frames: 0,
            num_bins,
            n_fft,
            sample_rate,
        };
    }

    let num_frames = 1 + samples.len() / hop;
    let half = (n_fft / 2) as isize;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = create_hann_window(n_fft);

    let mut magnitudes = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for frame_idx in 0..num_frames {
        let start = (frame_idx * hop) as isize - half;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let pos = start + i as isize;
            let sample = if pos >= 0 && (pos as usize) < samples.len() {
                samples[pos as usize]
            } else {
                0.0
            };
            *slot = Complex::new(sample * window[i], 0.0);
        }

        fft.process(&mut buffer);
        magnitudes.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
    }

    Spectrogram {
        magnitudes,
        num_frames,
        num_bins,
        n_fft,
        sample_rate,
    }
}

/// Periodic Hann window
pub fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}
