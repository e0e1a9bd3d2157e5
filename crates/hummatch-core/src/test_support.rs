//! Synthetic signals for tests

use std::f32::consts::PI;

pub const SR: u32 = 22050;

pub const C4: f32 = 261.63;
pub const D4: f32 = 293.66;
pub const E4: f32 = 329.63;
pub const F4: f32 = 349.23;
pub const FS4: f32 = 369.99;
pub const G4: f32 = 392.00;
pub const A4: f32 = 440.00;
pub const C5: f32 = 523.25;

pub fn tone(freq: f32, sr: u32, duration: f32) -> Vec<f32> {
    let n = (sr as f32 * duration) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
        .collect()
}

pub fn silence(sr: u32, duration: f32) -> Vec<f32> {
    vec![0.0; (sr as f32 * duration) as usize]
}

/// Concatenated tones, each `(frequency, seconds)`
pub fn melody(notes: &[(f32, f32)], sr: u32) -> Vec<f32> {
    notes
        .iter()
        .flat_map(|&(freq, duration)| tone(freq, sr, duration))
        .collect()
}

/// Same notes with every duration scaled (tempo change without pitch change)
pub fn stretched(notes: &[(f32, f32)], factor: f32) -> Vec<(f32, f32)> {
    notes.iter().map(|&(f, d)| (f, d * factor)).collect()
}

/// Same notes moved by `semitones`
pub fn transposed(notes: &[(f32, f32)], semitones: i32) -> Vec<(f32, f32)> {
    let ratio = 2f32.powf(semitones as f32 / 12.0);
    notes.iter().map(|&(f, d)| (f * ratio, d)).collect()
}

/// Deterministic uniform noise in [-amplitude, amplitude]
pub fn noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * amplitude
        })
        .collect()
}

/// C-E-G-C arpeggio, half a second per note
pub fn arpeggio() -> Vec<(f32, f32)> {
    vec![(C4, 0.5), (E4, 0.5), (G4, 0.5), (C5, 0.5)]
}

/// Stepwise tune that shares no interval pattern with the arpeggio
pub fn trill() -> Vec<(f32, f32)> {
    vec![
        (FS4, 0.25),
        (F4, 0.25),
        (FS4, 0.25),
        (F4, 0.25),
        (FS4, 0.25),
        (F4, 0.25),
        (FS4, 0.25),
        (F4, 0.25),
    ]
}

/// Scale run used as a second reference track
pub fn scale() -> Vec<(f32, f32)> {
    vec![
        (C4, 0.3),
        (D4, 0.3),
        (E4, 0.3),
        (F4, 0.3),
        (G4, 0.3),
        (A4, 0.3),
    ]
}
