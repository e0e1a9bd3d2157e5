//! Sample-rate conversion with rubato's windowed-sinc resampler

use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 128;
/// Impulse position used to measure the filter delay (input frames)
const IMPULSE_AT: usize = 256;

/// Resample mono audio to the target sample rate.
///
/// The output is aligned with the input: sample `k` of the result sits at
/// time `k / to_rate`, and its length is `len * to_rate / from_rate`.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let delay = measure_delay(ratio)?;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    // Keep feeding zeros until the delayed tail is flushed
    let needed = expected as isize + delay.max(0);
    let mut output = run(build_resampler(ratio)?, samples, needed.max(0) as usize)?;

    if delay >= 0 {
        output.drain(..(delay as usize).min(output.len()));
    } else {
        let mut padded = vec![0.0f32; delay.unsigned_abs()];
        padded.extend(output);
        output = padded;
    }
    output.resize(expected, 0.0);
    Ok(output)
}

fn build_resampler(ratio: f64) -> Result<SincFixedIn<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1).context("Failed to build resampler")
}

/// Push `samples` (then silence) through the resampler until at least
/// `min_output` frames have come out
fn run(mut resampler: SincFixedIn<f32>, samples: &[f32], min_output: usize) -> Result<Vec<f32>> {
    let mut output: Vec<f32> = Vec::with_capacity(min_output + CHUNK_SIZE);
    let mut position = 0;

    while output.len() < min_output || position < samples.len() {
        let mut chunk = vec![0.0f32; CHUNK_SIZE];
        if position < samples.len() {
            let end = (position + CHUNK_SIZE).min(samples.len());
            chunk[..end - position].copy_from_slice(&samples[position..end]);
        }
        position += CHUNK_SIZE;

        let result = resampler.process(&[chunk], None).context("Resampling failed")?;
        output.extend_from_slice(&result[0]);
    }
    Ok(output)
}

/// Output frames by which the resampler lags its input, measured on an
/// impulse so it holds for any ratio
fn measure_delay(ratio: f64) -> Result<isize> {
    let mut impulse = vec![0.0f32; CHUNK_SIZE];
    impulse[IMPULSE_AT] = 1.0;
    let response = run(build_resampler(ratio)?, &impulse, 4 * CHUNK_SIZE)?;

    let peak = response
        .iter()
        .enumerate()
        .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    let offset = peak.0 as f64 + parabolic_offset(&response, peak.0);

    Ok((offset - IMPULSE_AT as f64 * ratio).round() as isize)
}

/// Sub-sample position of a local maximum relative to `i`
fn parabolic_offset(values: &[f32], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[i - 1] as f64, values[i] as f64, values[i + 1] as f64);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Largest deviation from the analytic tone, away from the edges
    fn phase_error(from: u32, to: u32, freq: f32) -> f32 {
        let samples: Vec<f32> = (0..from)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / from as f32).sin())
            .collect();
        let out = resample_to_target(&samples, from, to).unwrap();
        (2000..out.len() - 2000)
            .map(|i| {
                let expected = (2.0 * std::f32::consts::PI * freq * i as f32 / to as f32).sin();
                (out[i] - expected).abs()
            })
            .fold(0.0f32, f32::max)
    }

    #[test]
    fn test_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_target(&samples, 22050, 22050).unwrap(), samples);
    }

    #[test]
    fn test_downsample_length() {
        let samples: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample_to_target(&samples, 44100, 22050).unwrap();
        assert_eq!(out.len(), 22050);
    }

    #[test]
    fn test_impulse_stays_in_place() {
        for from in [44100u32, 48000] {
            let mut samples = vec![0.0f32; from as usize / 2];
            samples[4000] = 1.0;
            let out = resample_to_target(&samples, from, 22050).unwrap();
            let peak = out
                .iter()
                .enumerate()
                .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0;
            let expected = 4000.0 * 22050.0 / from as f64;
            assert!((peak as f64 - expected).abs() <= 1.0, "{} Hz: peak at {}, expected {}", from, peak, expected);
        }
    }

    #[test]
    fn test_upsample_length_and_phase() {
        assert_eq!(resample_to_target(&vec![0.0; 16000], 16000, 22050).unwrap().len(), 22050);
        let err = phase_error(16000, 22050, 220.0);
        assert!(err < 0.1, "max error {}", err);
    }

    #[test]
    fn test_preserves_phase_from_48k() {
        let err = phase_error(48000, 22050, 220.0);
        assert!(err < 0.1, "max error {}", err);
    }

    #[test]
    fn test_preserves_phase_from_44k() {
        // At 440 Hz a one-sample slip already exceeds the tolerance
        let err = phase_error(44100, 22050, 440.0);
        assert!(err < 0.1, "max error {}", err);
    }
}
