//! Core audio data types
//!
//! Defines the format descriptors shared between the decoder, the filter
//! graph and the output device, plus the user-facing context configuration.
//!
//! **Format conventions:**
//! - Samples are f32 (floating point -1.0 to 1.0)
//! - Interleaved channel order: [L, R, L, R, ...]
//! - The internal mix bus is always stereo; the converter adapts it to the
//!   granted device layout at the end of the graph

/// Number of channels on the internal mix bus.
pub const MIX_CHANNELS: u16 = 2;

/// Default device buffer size in frames.
///
/// Small enough to keep effect trigger latency in the tens of milliseconds,
/// large enough to survive scheduling jitter on desktop systems.
pub const DEFAULT_BUFFER_FRAMES: u32 = 1024;

/// Native format of a decoded audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    /// Sample rate in Hz
    pub rate: u32,

    /// Channel count as stored in the file
    pub channels: u16,
}

impl SampleSpec {
    /// Number of interleaved samples in `frames` frames of this spec.
    pub fn samples_for(&self, frames: usize) -> usize {
        frames * self.channels as usize
    }

    /// Duration in seconds of `frames` frames at this rate.
    pub fn frames_to_seconds(&self, frames: usize) -> f64 {
        frames as f64 / self.rate as f64
    }
}

/// Format granted by the output device after negotiation.
///
/// Everything downstream of the mixer is expressed in this spec: the sink
/// emits exactly `buffer_frames` frames per pull and the device callback
/// asks for exactly that many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Granted sample rate in Hz
    pub rate: u32,

    /// Granted channel count
    pub channels: u16,

    /// Frames per device buffer
    pub buffer_frames: u32,
}

impl DeviceSpec {
    /// Interleaved samples in one device buffer.
    pub fn samples_per_buffer(&self) -> usize {
        self.buffer_frames as usize * self.channels as usize
    }

    /// Duration in seconds of one device buffer.
    pub fn buffer_seconds(&self) -> f64 {
        self.buffer_frames as f64 / self.rate as f64
    }
}

/// User configuration applied when opening an audio context.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Output device name, `None` for the system default
    pub device: Option<String>,

    /// Requested frames per device buffer
    pub buffer_frames: u32,

    /// Initial playback volume (0.0 to 1.0)
    pub volume: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_spec_samples_for() {
        let spec = SampleSpec { rate: 44100, channels: 2 };
        assert_eq!(spec.samples_for(1024), 2048);

        let mono = SampleSpec { rate: 22050, channels: 1 };
        assert_eq!(mono.samples_for(1024), 1024);
    }

    #[test]
    fn test_sample_spec_frames_to_seconds() {
        let spec = SampleSpec { rate: 44100, channels: 2 };
        assert_eq!(spec.frames_to_seconds(44100), 1.0);
        assert_eq!(spec.frames_to_seconds(22050), 0.5);
    }

    #[test]
    fn test_device_spec_samples_per_buffer() {
        let spec = DeviceSpec { rate: 48000, channels: 2, buffer_frames: 1024 };
        assert_eq!(spec.samples_per_buffer(), 2048);
        assert!((spec.buffer_seconds() - 1024.0 / 48000.0).abs() < 1e-12);
    }

    #[test]
    fn test_context_config_default() {
        let config = ContextConfig::default();
        assert!(config.device.is_none());
        assert_eq!(config.buffer_frames, DEFAULT_BUFFER_FRAMES);
        assert_eq!(config.volume, 1.0);
    }
}
