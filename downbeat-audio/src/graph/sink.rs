//! Fixed-frame graph sink
//!
//! Accumulates converted samples and hands them out in frames of exactly
//! one device buffer. The playback callback relies on this: every
//! successful pull fills the destination completely, with the final
//! partial frame zero-padded up to size.

/// Buffers converted samples and emits device-buffer-sized frames.
pub struct FrameSink {
    /// Samples per emitted frame (device buffer frames times channels)
    frame_samples: usize,

    buf: Vec<f32>,

    /// Reused backing storage for the emitted frame
    out: Vec<f32>,
}

impl FrameSink {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples,
            buf: Vec::new(),
            out: Vec::new(),
        }
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Append converted samples.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.buf.extend_from_slice(samples);
    }

    /// Whether a full frame is buffered.
    pub fn frame_ready(&self) -> bool {
        self.buf.len() >= self.frame_samples
    }

    /// Samples still missing for one full frame. Zero when a frame is ready.
    pub fn deficit(&self) -> usize {
        self.frame_samples.saturating_sub(self.buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Zero-pad the buffered remainder up to one full frame.
    ///
    /// Used once at end of stream so the last samples still go out as a
    /// complete device buffer.
    pub fn pad_to_frame(&mut self) {
        if !self.buf.is_empty() && self.buf.len() < self.frame_samples {
            self.buf.resize(self.frame_samples, 0.0);
        }
    }

    /// Take one full frame if available.
    ///
    /// The returned slice lives in the sink's internal buffer until the
    /// next call.
    pub fn take_frame(&mut self) -> Option<&[f32]> {
        if self.buf.len() < self.frame_samples {
            return None;
        }
        self.out.clear();
        self.out.extend(self.buf.drain(..self.frame_samples));
        Some(&self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_exactly_one_frame() {
        let mut sink = FrameSink::new(4);
        sink.push_samples(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);

        let frame = sink.take_frame().unwrap();
        assert_eq!(frame, &[0.1, 0.2, 0.3, 0.4]);

        // Remainder is not a full frame yet
        assert!(sink.take_frame().is_none());
        assert_eq!(sink.deficit(), 2);
    }

    #[test]
    fn test_pad_completes_final_frame() {
        let mut sink = FrameSink::new(4);
        sink.push_samples(&[0.7]);

        sink.pad_to_frame();
        let frame = sink.take_frame().unwrap();
        assert_eq!(frame, &[0.7, 0.0, 0.0, 0.0]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pad_on_empty_is_noop() {
        let mut sink = FrameSink::new(4);
        sink.pad_to_frame();
        assert!(sink.is_empty());
        assert!(sink.take_frame().is_none());
    }

    #[test]
    fn test_pad_on_full_frame_is_noop() {
        let mut sink = FrameSink::new(2);
        sink.push_samples(&[0.1, 0.2, 0.3]);
        sink.pad_to_frame();
        assert_eq!(sink.take_frame().unwrap(), &[0.1, 0.2]);
        // The trailing sample was untouched by the pad
        assert_eq!(sink.deficit(), 1);
    }
}
