//! Output format converter
//!
//! Last processing node before the sink: clamps the mixed stereo signal to
//! the valid sample range and maps it onto the channel layout the device
//! granted. Mono devices get the average of left and right; layouts wider
//! than stereo get the pair on the front channels and silence elsewhere.

/// Maps the stereo mix bus to the granted device layout.
pub struct OutputConverter {
    channels: u16,
    buf: Vec<f32>,
}

impl OutputConverter {
    pub fn new(channels: u16) -> Self {
        Self {
            channels,
            buf: Vec::new(),
        }
    }

    /// Convert interleaved stereo samples to the device layout.
    ///
    /// The result lives in the converter's internal buffer until the next
    /// call.
    pub fn convert(&mut self, stereo: &[f32]) -> &[f32] {
        self.buf.clear();
        let frames = stereo.len() / 2;
        self.buf.reserve(frames * self.channels as usize);

        match self.channels {
            1 => {
                for pair in stereo.chunks_exact(2) {
                    let mono = (pair[0] + pair[1]) * 0.5;
                    self.buf.push(mono.clamp(-1.0, 1.0));
                }
            }
            2 => {
                for sample in stereo {
                    self.buf.push(sample.clamp(-1.0, 1.0));
                }
            }
            wide => {
                for pair in stereo.chunks_exact(2) {
                    self.buf.push(pair[0].clamp(-1.0, 1.0));
                    self.buf.push(pair[1].clamp(-1.0, 1.0));
                    for _ in 2..wide {
                        self.buf.push(0.0);
                    }
                }
            }
        }

        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_clamps_only() {
        let mut converter = OutputConverter::new(2);
        let out = converter.convert(&[0.5, -0.5, 1.5, -1.5]);
        assert_eq!(out, &[0.5, -0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_mono_averages() {
        let mut converter = OutputConverter::new(1);
        let out = converter.convert(&[0.2, 0.4, -1.0, -1.0]);
        assert_eq!(out, &[0.3, -1.0]);
    }

    #[test]
    fn test_wide_pads_with_silence() {
        let mut converter = OutputConverter::new(4);
        let out = converter.convert(&[0.1, 0.2]);
        assert_eq!(out, &[0.1, 0.2, 0.0, 0.0]);
    }
}
