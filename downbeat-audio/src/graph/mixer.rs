//! Two-input audio mixer
//!
//! Sums the music and effect lanes sample by sample at unity gain. No
//! normalization is applied, so a silent or absent effect lane leaves the
//! music signal untouched; clipping protection happens in the output
//! converter.
//!
//! Duration policy is "first": the mixed stream ends when the music lane
//! ends. Effect samples beyond that point are never requested.

use crate::graph::source::{EffectSource, MusicSource};

/// Unity-gain summing mixer with a reusable output buffer.
pub struct Mixer {
    mix_buf: Vec<f32>,
}

impl Mixer {
    pub fn new() -> Self {
        Self { mix_buf: Vec::new() }
    }

    /// Mix `frames` stereo frames from both lanes.
    ///
    /// The caller guarantees both lanes can supply that many frames; the
    /// returned slice lives in the mixer's internal buffer until the next
    /// call.
    pub fn mix(
        &mut self,
        music: &mut MusicSource,
        effect: &mut EffectSource,
        frames: usize,
    ) -> &[f32] {
        self.mix_buf.clear();
        self.mix_buf.reserve(frames * 2);

        for _ in 0..frames {
            let (music_l, music_r) = music.pop_frame();
            let (effect_l, effect_r) = effect.pop_frame();
            self.mix_buf.push(music_l + effect_l);
            self.mix_buf.push(music_r + effect_r);
        }

        &self.mix_buf
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamFrame;
    use crate::types::SampleSpec;

    fn music_with(samples: &[f32]) -> MusicSource {
        let spec = SampleSpec { rate: 44100, channels: 2 };
        let mut music = MusicSource::new(spec, 44100).unwrap();
        let frame = StreamFrame { samples, spec, timestamp: 0.0 };
        music.push(Some(&frame)).unwrap();
        music
    }

    #[test]
    fn test_silent_effect_is_transparent() {
        let mut music = music_with(&[0.1, -0.2, 0.3, -0.4]);
        let mut effect = EffectSource::new();
        effect.push(None, 2);

        let mut mixer = Mixer::new();
        let mixed = mixer.mix(&mut music, &mut effect, 2);
        assert_eq!(mixed, &[0.1, -0.2, 0.3, -0.4]);
    }

    #[test]
    fn test_effect_adds_at_unity_gain() {
        let mut music = music_with(&[0.1, 0.1, 0.1, 0.1]);
        let mut effect = EffectSource::new();
        effect.push(
            Some(&crate::sample::EffectFrame::from_samples(vec![
                0.2, 0.3, -0.05, 0.0,
            ])),
            0,
        );

        let mut mixer = Mixer::new();
        let mixed = mixer.mix(&mut music, &mut effect, 2);

        let expected = [0.1 + 0.2, 0.1 + 0.3, 0.1 - 0.05, 0.1 + 0.0];
        for (got, want) in mixed.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {}, want {}", got, want);
        }
    }

    #[test]
    fn test_mix_buffer_reused_across_calls() {
        let mut music = music_with(&[0.5, 0.5, 0.6, 0.6]);
        let mut effect = EffectSource::new();
        effect.push(None, 2);

        let mut mixer = Mixer::new();
        assert_eq!(mixer.mix(&mut music, &mut effect, 1), &[0.5, 0.5]);
        assert_eq!(mixer.mix(&mut music, &mut effect, 1), &[0.6, 0.6]);
    }
}
