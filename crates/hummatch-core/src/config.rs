//! Configuration parameters for the melody matcher
//!
//! Every section can be overridden from TOML; missing keys keep defaults.

use crate::error::MatchError;
use serde::{Deserialize, Serialize};

/// Analysis configuration shared by every matcher variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Sample rate every buffer is resampled to (Hz)
    pub sample_rate: u32,
    /// Analysis hop between feature frames (samples)
    pub hop_length: usize,
    /// Sequences shorter than this carry no reliable melody
    pub min_frames: usize,

    pub preprocess: PreprocessConfig,
    pub chroma: ChromaConfig,
    pub pitch: PitchConfig,
    pub scoring: ScoringConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            hop_length: 512,
            min_frames: 10,
            preprocess: PreprocessConfig::default(),
            chroma: ChromaConfig::default(),
            pitch: PitchConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Silence trimming and rumble filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub enabled: bool,
    /// Frames quieter than this many dB below the loudest frame are trimmed
    pub trim_top_db: f32,
    pub trim_frame_length: usize,
    pub highpass_cutoff_hz: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trim_top_db: 60.0,
            trim_frame_length: 2048,
            highpass_cutoff_hz: 100.0,
        }
    }
}

/// Constant-Q chroma, HPSS and CENS parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub n_fft: usize,
    /// Lowest constant-Q centre frequency; must be a C so bin 0 lands on pitch class 0
    pub fmin: f32,
    pub n_octaves: u32,
    pub bins_per_octave: u32,
    /// Median filter length for harmonic/percussive separation (frames and bins)
    pub hpss_kernel: usize,
    /// Soft-mask exponent for HPSS
    pub hpss_power: f32,
    /// CENS smoothing window (frames); 21 frames is about half a second
    pub cens_smoothing: usize,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            n_fft: 4096,
            fmin: 65.406_39, // C2
            n_octaves: 6,
            bins_per_octave: 36,
            hpss_kernel: 31,
            hpss_power: 2.0,
            cens_smoothing: 21,
        }
    }
}

/// Pitch tracker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Analysis frame for YIN and piptrack
    pub frame_length: usize,

    // Probabilistic tracker
    pub pyin_fmin: f32, // C2
    pub pyin_fmax: f32, // C7
    /// Pitch grid resolution in semitones
    pub pyin_resolution: f32,
    pub pyin_switch_prob: f32,
    pub pyin_no_trough_prob: f32,
    /// Fastest pitch movement the HMM allows (octaves per second)
    pub pyin_max_transition_rate: f32,

    // Fast peak-picking tracker
    pub fast_fmin: f32,
    pub fast_fmax: f32,
    /// Per-frame peak threshold relative to the frame maximum
    pub piptrack_threshold: f32,

    // Refined tracker
    pub refined_fmin: f32,
    pub refined_fmax: f32,
    /// Frames below this fraction of the clip's loudest peak are silent
    pub refined_gate: f32,
    pub refined_median_window: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            pyin_fmin: 65.406_39,
            pyin_fmax: 2093.004_5,
            pyin_resolution: 0.1,
            pyin_switch_prob: 0.01,
            pyin_no_trough_prob: 0.01,
            pyin_max_transition_rate: 35.92,
            fast_fmin: 150.0,
            fast_fmax: 4000.0,
            piptrack_threshold: 0.1,
            refined_fmin: 80.0,
            refined_fmax: 1000.0,
            refined_gate: 0.10,
            refined_median_window: 5,
        }
    }
}

/// Cost-to-similarity curves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Slope of the linear chroma curve: cost 1/scale maps to 0
    pub chroma_linear_scale: f64,
    pub cens_sigma: f64,
    pub cens_gamma: f64,
    /// Contour tolerance in semitones
    pub semitone_threshold: f64,
    /// Contour tolerance in z-score units
    pub zscore_threshold: f64,
    pub length_penalty: f64,
    pub min_length_ratio: f64,
    pub max_length_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            chroma_linear_scale: 2.0,
            cens_sigma: 0.30,
            cens_gamma: 2.0,
            semitone_threshold: 4.0,
            zscore_threshold: 2.0,
            length_penalty: 0.5,
            min_length_ratio: 0.5,
            max_length_ratio: 2.0,
        }
    }
}

impl MatcherConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), MatchError> {
        fn invalid(msg: &str) -> Result<(), MatchError> {
            Err(MatchError::Configuration(msg.to_string()))
        }

        if self.sample_rate == 0 {
            return invalid("sample_rate must be > 0");
        }
        if self.hop_length == 0 {
            return invalid("hop_length must be > 0");
        }
        if self.preprocess.trim_frame_length == 0 {
            return invalid("preprocess.trim_frame_length must be > 0");
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.preprocess.highpass_cutoff_hz <= 0.0 || self.preprocess.highpass_cutoff_hz >= nyquist {
            return invalid("preprocess.highpass_cutoff_hz must lie between 0 and Nyquist");
        }

        let chroma = &self.chroma;
        if chroma.n_fft < 2 || !chroma.n_fft.is_power_of_two() {
            return invalid("chroma.n_fft must be a power of two");
        }
        if chroma.bins_per_octave == 0 || chroma.bins_per_octave % 12 != 0 {
            return invalid("chroma.bins_per_octave must be a positive multiple of 12");
        }
        if chroma.n_octaves == 0 || chroma.fmin <= 0.0 {
            return invalid("chroma.fmin and chroma.n_octaves must be > 0");
        }
        if chroma.fmin * 2f32.powi(chroma.n_octaves as i32) > nyquist {
            return invalid("chroma range exceeds Nyquist");
        }
        if chroma.hpss_kernel == 0 || chroma.cens_smoothing == 0 {
            return invalid("chroma.hpss_kernel and chroma.cens_smoothing must be > 0");
        }

        let pitch = &self.pitch;
        if pitch.frame_length < 4 || !pitch.frame_length.is_power_of_two() {
            return invalid("pitch.frame_length must be a power of two");
        }
        for (lo, hi, name) in [
            (pitch.pyin_fmin, pitch.pyin_fmax, "pyin"),
            (pitch.fast_fmin, pitch.fast_fmax, "fast"),
            (pitch.refined_fmin, pitch.refined_fmax, "refined"),
        ] {
            if lo <= 0.0 || lo >= hi || hi > nyquist {
                return Err(MatchError::Configuration(format!(
                    "pitch.{name}_fmin must be > 0 and below pitch.{name}_fmax (<= Nyquist)"
                )));
            }
        }
        if pitch.pyin_resolution <= 0.0 {
            return invalid("pitch.pyin_resolution must be > 0");
        }
        if pitch.refined_median_window == 0 || pitch.refined_median_window % 2 == 0 {
            return invalid("pitch.refined_median_window must be odd");
        }

        let scoring = &self.scoring;
        if scoring.cens_sigma <= 0.0 || scoring.semitone_threshold <= 0.0 || scoring.zscore_threshold <= 0.0 {
            return invalid("scoring spreads and thresholds must be > 0");
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(scoring.cens_gamma) || !positive(scoring.chroma_linear_scale) {
            return invalid("scoring.cens_gamma and scoring.chroma_linear_scale must be > 0");
        }
        if !scoring.length_penalty.is_finite() || scoring.length_penalty < 0.0 {
            return invalid("scoring.length_penalty must be >= 0");
        }
        if scoring.min_length_ratio >= scoring.max_length_ratio {
            return invalid("scoring.min_length_ratio must be < scoring.max_length_ratio");
        }
        Ok(())
    }
}
