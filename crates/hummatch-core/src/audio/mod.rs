//! Audio decoding and resampling
//!
//! Supports WAV, MP3, FLAC and OGG with dedicated pure Rust decoders, and
//! WebM/Matroska or MP4 containers through Symphonia.

mod container;
mod decoder;
mod resample;

pub use container::decode_container;
pub use decoder::{decode_audio, AudioData};
pub use resample::resample_to_target;

use crate::error::MatchError;
use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    // Pure audio formats
    Wav,
    Mp3,
    Flac,
    Ogg,

    // Container formats (browser recordings, AAC files)
    Webm,
    Mkv,
    Mp4,

    Unknown,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("wav") | Some("wave") => AudioFormat::Wav,
            Some("mp3") => AudioFormat::Mp3,
            Some("flac") => AudioFormat::Flac,
            Some("ogg") | Some("oga") => AudioFormat::Ogg,
            Some("webm") => AudioFormat::Webm,
            Some("mkv") | Some("mka") => AudioFormat::Mkv,
            Some("mp4") | Some("m4a") => AudioFormat::Mp4,
            _ => AudioFormat::Unknown,
        }
    }

    /// Check if format is handled by the container demuxer
    pub fn is_container(&self) -> bool {
        matches!(self, AudioFormat::Webm | AudioFormat::Mkv | AudioFormat::Mp4)
    }
}

/// Mono audio at a fixed sample rate, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a file into a mono buffer at `sample_rate`
pub fn load_samples(path: &Path, sample_rate: u32) -> Result<SampleBuffer, MatchError> {
    let audio = decode_audio(path, sample_rate).map_err(|e| MatchError::decode(path, &e))?;

    log::debug!(
        "Loaded {}: {:.2}s @ {}Hz",
        path.display(),
        audio.duration_ms as f64 / 1000.0,
        audio.sample_rate
    );

    Ok(SampleBuffer::new(audio.samples, audio.sample_rate))
}
