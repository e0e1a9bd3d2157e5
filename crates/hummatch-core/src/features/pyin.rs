//! Probabilistic YIN fundamental-frequency tracker
//!
//! Every frame gets a YIN cumulative-mean-normalized difference curve.
//! Instead of one hard threshold, a Beta(2, 18) distribution over
//! thresholds spreads probability across the curve's troughs. The
//! per-frame pitch candidates are then decoded with a Viterbi pass over
//! a voiced/unvoiced pitch-bin HMM, which favours smooth contours.

use crate::config::MatcherConfig;
use rustfft::{num_complex::Complex, FftPlanner};

const N_THRESHOLDS: usize = 100;
const BETA_ALPHA: u32 = 2;
const BETA_BETA: u32 = 18;
const BOLTZMANN_PARAMETER: f64 = 2.0;
/// Numerical floor for difference and energy values
const YIN_FLOOR: f64 = 1e-6;

/// Probabilistic YIN tracker
#[derive(Debug, Clone)]
pub struct ProbabilisticYin {
    sample_rate: u32,
    frame_length: usize,
    hop_length: usize,
    fmin: f64,
    fmax: f64,
    resolution: f64,
    switch_prob: f64,
    no_trough_prob: f64,
    max_transition_rate: f64,
}

/// Candidate periods of one frame with their probabilities
struct FrameCandidates {
    /// (pitch bin, probability)
    bins: Vec<(usize, f64)>,
    voiced_probability: f64,
}

impl ProbabilisticYin {
    pub fn new(config: &MatcherConfig) -> Self {
        let pitch = &config.pitch;
        Self {
            sample_rate: config.sample_rate,
            frame_length: pitch.frame_length,
            hop_length: config.hop_length,
            fmin: pitch.pyin_fmin as f64,
            fmax: pitch.pyin_fmax as f64,
            resolution: pitch.pyin_resolution as f64,
            switch_prob: pitch.pyin_switch_prob as f64,
            no_trough_prob: pitch.pyin_no_trough_prob as f64,
            max_transition_rate: pitch.pyin_max_transition_rate as f64,
        }
    }

    fn bins_per_semitone(&self) -> usize {
        (1.0 / self.resolution).ceil() as usize
    }

    fn num_pitch_bins(&self) -> usize {
        let per_octave = 12 * self.bins_per_semitone();
        (per_octave as f64 * (self.fmax / self.fmin).log2() + 1e-3).floor() as usize + 1
    }

    fn bin_frequency(&self, bin: usize) -> f64 {
        self.fmin * 2f64.powf(bin as f64 / (12 * self.bins_per_semitone()) as f64)
    }

    /// Track f0 over centred frames; `None` marks an unvoiced frame.
    pub fn track(&self, samples: &[f32]) -> Vec<Option<f32>> {
        if samples.is_empty() || self.hop_length == 0 {
            return Vec::new();
        }

        let win_length = self.frame_length / 2;
        let min_period = ((self.sample_rate as f64 / self.fmax).floor() as usize).max(1);
        let max_period = ((self.sample_rate as f64 / self.fmin).ceil() as usize)
            .min(self.frame_length - win_length - 1);
        if min_period + 1 >= max_period {
            return Vec::new();
        }

        let num_frames = 1 + samples.len() / self.hop_length;
        let half = (self.frame_length / 2) as isize;
        let beta_probs = threshold_probabilities();

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(self.frame_length);
        let inverse = planner.plan_fft_inverse(self.frame_length);

        let mut frame = vec![0.0f64; self.frame_length];
        let candidates: Vec<FrameCandidates> = (0..num_frames)
            .map(|t| {
                let start = (t * self.hop_length) as isize - half;
                for (i, slot) in frame.iter_mut().enumerate() {
                    let pos = start + i as isize;
                    *slot = if pos >= 0 && (pos as usize) < samples.len() {
                        samples[pos as usize] as f64
                    } else {
                        0.0
                    };
                }
                let cmndf = normalized_difference(
                    &frame,
                    win_length,
                    min_period,
                    max_period,
                    forward.as_ref(),
                    inverse.as_ref(),
                );
                self.frame_candidates(&cmndf, min_period, &beta_probs)
            })
            .collect();

        self.decode(&candidates)
    }

    /// Trough probabilities of one frame mapped onto the pitch grid
    fn frame_candidates(&self, cmndf: &[f64], min_period: usize, beta_probs: &[f64]) -> FrameCandidates {
        let troughs = find_troughs(cmndf);
        if troughs.is_empty() {
            return FrameCandidates {
                bins: Vec::new(),
                voiced_probability: 0.0,
            };
        }

        let heights: Vec<f64> = troughs.iter().map(|&i| cmndf[i]).collect();
        let mut probs = vec![0.0f64; troughs.len()];

        for (k, &beta) in beta_probs.iter().enumerate() {
            let threshold = (k + 1) as f64 / N_THRESHOLDS as f64;
            let below = heights.iter().filter(|&&h| h < threshold).count();
            if below == 0 {
                continue;
            }
            let mut position = 0usize;
            for (p, &h) in probs.iter_mut().zip(heights.iter()) {
                if h < threshold {
                    *p += boltzmann_pmf(position, below) * beta;
                    position += 1;
                }
            }
        }

        // The global minimum absorbs mass from thresholds no trough passes
        let global_min = heights
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let thresholds_below_min = (0..N_THRESHOLDS)
            .filter(|&k| heights[global_min] >= (k + 1) as f64 / N_THRESHOLDS as f64)
            .count();
        probs[global_min] += self.no_trough_prob * beta_probs[..thresholds_below_min].iter().sum::<f64>();

        let num_bins = self.num_pitch_bins();
        let per_octave = (12 * self.bins_per_semitone()) as f64;
        let mut bins = Vec::with_capacity(troughs.len());
        let mut total = 0.0;
        for (&trough, &prob) in troughs.iter().zip(probs.iter()) {
            if prob <= 0.0 {
                continue;
            }
            let period = (min_period + trough) as f64 + parabolic_shift(cmndf, trough);
            let f0 = self.sample_rate as f64 / period;
            let bin = (per_octave * (f0 / self.fmin).log2()).round();
            let bin = bin.clamp(0.0, (num_bins - 1) as f64) as usize;
            bins.push((bin, prob));
            total += prob;
        }

        FrameCandidates {
            bins,
            voiced_probability: total.clamp(0.0, 1.0),
        }
    }

    /// Viterbi over 2 * num_bins states: voiced bins first, then unvoiced
    fn decode(&self, candidates: &[FrameCandidates]) -> Vec<Option<f32>> {
        let num_bins = self.num_pitch_bins();
        let num_states = 2 * num_bins;
        let tiny = f64::MIN_POSITIVE;

        let max_semitones = (self.max_transition_rate * 12.0 * self.hop_length as f64
            / self.sample_rate as f64)
            .round() as usize;
        let width = max_semitones * self.bins_per_semitone() + 1;
        let reach = width / 2;

        // Triangular local transition, each source row renormalized
        let weight = |d: usize| 1.0 - d as f64 / ((width + 1) as f64 / 2.0);
        let log_weight: Vec<f64> = (0..=reach).map(|d| weight(d).ln()).collect();
        let log_row_sum: Vec<f64> = (0..num_bins)
            .map(|b| {
                let lo = b.saturating_sub(reach);
                let hi = (b + reach).min(num_bins - 1);
                (lo..=hi).map(|j| weight(b.abs_diff(j))).sum::<f64>().ln()
            })
            .collect();
        let log_stay = (1.0 - self.switch_prob + tiny).ln();
        let log_switch = (self.switch_prob + tiny).ln();

        let log_observation = |frame: &FrameCandidates, out: &mut Vec<f64>| {
            out.clear();
            out.resize(num_states, 0.0);
            let mut voiced = vec![0.0f64; num_bins];
            for &(bin, prob) in &frame.bins {
                voiced[bin] += prob;
            }
            let unvoiced = (1.0 - frame.voiced_probability) / num_bins as f64;
            for b in 0..num_bins {
                out[b] = (voiced[b] + tiny).ln();
                out[num_bins + b] = (unvoiced + tiny).ln();
            }
        };

        let mut observation = Vec::new();
        log_observation(&candidates[0], &mut observation);
        let log_init = (1.0 / num_states as f64).ln();
        let mut value: Vec<f64> = observation.iter().map(|o| o + log_init).collect();
        let mut next = vec![0.0f64; num_states];
        let mut backpointers: Vec<Vec<u32>> = Vec::with_capacity(candidates.len());

        for frame in &candidates[1..] {
            log_observation(frame, &mut observation);
            let mut pointers = vec![0u32; num_states];

            for target in 0..num_states {
                let (target_voiced, target_bin) = (target < num_bins, target % num_bins);
                let lo = target_bin.saturating_sub(reach);
                let hi = (target_bin + reach).min(num_bins - 1);

                let mut best = f64::NEG_INFINITY;
                let mut best_state = target;
                for source_voiced in [true, false] {
                    let offset = if source_voiced { 0 } else { num_bins };
                    let log_switch_term = if source_voiced == target_voiced { log_stay } else { log_switch };
                    for source_bin in lo..=hi {
                        let source = offset + source_bin;
                        let score = value[source]
                            + log_switch_term
                            + log_weight[source_bin.abs_diff(target_bin)]
                            - log_row_sum[source_bin];
                        if score > best {
                            best = score;
                            best_state = source;
                        }
                    }
                }
                next[target] = best + observation[target];
                pointers[target] = best_state as u32;
            }

            std::mem::swap(&mut value, &mut next);
            backpointers.push(pointers);
        }

        let mut state = value
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(num_bins);

        let mut states = vec![0usize; candidates.len()];
        states[candidates.len() - 1] = state;
        for (t, pointers) in backpointers.iter().enumerate().rev() {
            state = pointers[state] as usize;
            states[t] = state;
        }

        states
            .into_iter()
            .map(|s| (s < num_bins).then(|| self.bin_frequency(s) as f32))
            .collect()
    }
}

/// YIN cumulative-mean-normalized difference for lags `min_period..=max_period`
fn normalized_difference(
    frame: &[f64],
    win_length: usize,
    min_period: usize,
    max_period: usize,
    forward: &dyn rustfft::Fft<f64>,
    inverse: &dyn rustfft::Fft<f64>,
) -> Vec<f64> {
    let n = frame.len();

    // acf[tau] = sum_{j < W} x[j] x[j + tau], via FFT cross-correlation
    let mut full: Vec<Complex<f64>> = frame.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let mut head: Vec<Complex<f64>> = frame
        .iter()
        .enumerate()
        .map(|(j, &x)| Complex::new(if j < win_length { x } else { 0.0 }, 0.0))
        .collect();
    forward.process(&mut full);
    forward.process(&mut head);
    let mut product: Vec<Complex<f64>> = full
        .iter()
        .zip(head.iter())
        .map(|(a, b)| a * b.conj())
        .collect();
    inverse.process(&mut product);
    let acf: Vec<f64> = product.iter().map(|c| c.re / n as f64).collect();

    let mut prefix = vec![0.0f64; n + 1];
    for (i, &x) in frame.iter().enumerate() {
        prefix[i + 1] = prefix[i] + x * x;
    }
    let energy = |tau: usize| prefix[tau + win_length] - prefix[tau];

    let mut difference = vec![0.0f64; max_period + 1];
    for (tau, d) in difference.iter_mut().enumerate().skip(1) {
        let value = energy(0) + energy(tau) - 2.0 * acf[tau];
        *d = if value.abs() < YIN_FLOOR { 0.0 } else { value.max(0.0) };
    }

    let mut running = 0.0;
    let mut cmndf = Vec::with_capacity(max_period + 1 - min_period);
    for (tau, &d) in difference.iter().enumerate().skip(1) {
        running += d;
        if tau >= min_period {
            let mean = running / tau as f64;
            cmndf.push(if mean > 0.0 { d / mean } else { 1.0 });
        }
    }
    cmndf
}

/// Local minima; the first element counts when below its right neighbour,
/// the last when below its left neighbour.
fn find_troughs(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    (0..n)
        .filter(|&i| match i {
            0 => n > 1 && values[0] < values[1],
            _ if i + 1 == n => values[i] < values[i - 1],
            _ => values[i] < values[i - 1] && values[i] <= values[i + 1],
        })
        .collect()
}

/// Sub-lag offset of a trough from a parabola through its neighbours
fn parabolic_shift(values: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let a = values[i + 1] + values[i - 1] - 2.0 * values[i];
    let b = 0.5 * (values[i + 1] - values[i - 1]);
    if b.abs() < a.abs() {
        -b / a
    } else {
        0.0
    }
}

/// Probability mass of each threshold interval under Beta(2, 18)
fn threshold_probabilities() -> Vec<f64> {
    let cdf: Vec<f64> = (0..=N_THRESHOLDS)
        .map(|k| beta_cdf(k as f64 / N_THRESHOLDS as f64, BETA_ALPHA, BETA_BETA))
        .collect();
    cdf.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Regularized incomplete beta for integer parameters (binomial tail sum)
fn beta_cdf(x: f64, a: u32, b: u32) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let n = a + b - 1;
    (a..=n)
        .map(|j| binomial(n, j) * x.powi(j as i32) * (1.0 - x).powi((n - j) as i32))
        .sum()
}

fn binomial(n: u32, k: u32) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Truncated geometric prior favouring earlier troughs
fn boltzmann_pmf(position: usize, count: usize) -> f64 {
    let lambda = BOLTZMANN_PARAMETER;
    (1.0 - (-lambda).exp()) * (-lambda * position as f64).exp() / (1.0 - (-lambda * count as f64).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{melody, silence, tone, A4, C4, G4, SR};
    use approx::assert_relative_eq;

    #[test]
    fn test_beta_distribution_mass() {
        let probs = threshold_probabilities();
        assert_eq!(probs.len(), N_THRESHOLDS);
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        // Beta(2, 18) has its mode near 0.056
        let peak = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak <= 6, "peak at {}", peak);
    }

    #[test]
    fn test_boltzmann_sums_to_one() {
        for count in 1..6 {
            let total: f64 = (0..count).map(|p| boltzmann_pmf(p, count)).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_troughs() {
        let values = [0.5, 0.9, 0.2, 0.4, 0.1, 0.3, 0.05];
        assert_eq!(find_troughs(&values), vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_pitch_grid() {
        let tracker = ProbabilisticYin::new(&MatcherConfig::default());
        assert_eq!(tracker.num_pitch_bins(), 601);
        assert_relative_eq!(tracker.bin_frequency(0), 65.406_39, epsilon = 1e-3);
        assert_relative_eq!(tracker.bin_frequency(600), 2093.0, epsilon = 0.5);
    }

    #[test]
    fn test_tracks_steady_tone() {
        let tracker = ProbabilisticYin::new(&MatcherConfig::default());
        let f0 = tracker.track(&tone(A4, SR, 1.0));
        assert_eq!(f0.len(), 1 + SR as usize / 512);

        let interior = &f0[5..f0.len() - 5];
        assert!(interior.iter().all(|f| f.is_some()));
        for f in interior.iter().flatten() {
            // 0.1 semitone grid
            assert!((f - A4).abs() / A4 < 0.01, "f0 {}", f);
        }
    }

    #[test]
    fn test_follows_note_change() {
        let tracker = ProbabilisticYin::new(&MatcherConfig::default());
        let f0 = tracker.track(&melody(&[(C4, 0.6), (G4, 0.6)], SR));
        let first = f0[12].expect("voiced");
        let second = f0[f0.len() - 12].expect("voiced");
        assert!((first - C4).abs() / C4 < 0.01, "first {}", first);
        assert!((second - G4).abs() / G4 < 0.01, "second {}", second);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let tracker = ProbabilisticYin::new(&MatcherConfig::default());
        let f0 = tracker.track(&silence(SR, 0.5));
        assert!(!f0.is_empty());
        assert!(f0.iter().all(|f| f.is_none()));
        assert!(tracker.track(&[]).is_empty());
    }
}
