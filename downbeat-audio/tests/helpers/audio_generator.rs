//! Audio test file generation
//!
//! Deterministic WAV fixtures with known characteristics, so the decode
//! and playback pipeline can be exercised without shipping binary assets.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn wav_spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a stereo sine wave WAV file at 44.1 kHz.
///
/// `amplitude` is 0.0 to 1.0; 0.5 leaves headroom against clipping.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    generate_sine(path, duration_ms, frequency_hz, amplitude, 2, TEST_SAMPLE_RATE)
}

/// Generate a mono sine wave WAV file at 44.1 kHz.
pub fn generate_mono_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    generate_sine(path, duration_ms, frequency_hz, amplitude, 1, TEST_SAMPLE_RATE)
}

/// Generate a stereo sine wave WAV file at an arbitrary sample rate, for
/// exercising the resampling path.
pub fn generate_sine_wav_at_rate<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    generate_sine(path, duration_ms, frequency_hz, amplitude, 2, sample_rate)
}

/// Generate a silent stereo WAV file at 44.1 kHz.
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, wav_spec(2, TEST_SAMPLE_RATE))?;

    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for _ in 0..total_frames * 2 {
        writer.write_sample(0i16)?;
    }

    writer.finalize()?;
    Ok(())
}

fn generate_sine<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
    channels: u16,
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, wav_spec(channels, sample_rate))?;

    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let amplitude_i16 = (amplitude * i16::MAX as f32) as i16;

    for frame_idx in 0..total_frames {
        let t = frame_idx as f32 / sample_rate as f32;
        let sample_i16 = ((2.0 * PI * frequency_hz * t).sin() * amplitude_i16 as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample_i16)?;
        }
    }

    writer.finalize()?;
    Ok(())
}
