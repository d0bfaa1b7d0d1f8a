//! Graph source nodes
//!
//! The two inputs of the filter graph. The music source accepts decoder
//! frames in the stream's native format and adapts them to the mix format;
//! the effect source accepts pre-converted effect frames as-is.
//!
//! Each source counts failed requests: how many times a pull ran dry on
//! this input since it was last fed. The playback callback reads the
//! counters to decide which input to feed next.

use crate::error::{Error, Result};
use crate::graph::adapt::LinkAdapter;
use crate::sample::EffectFrame;
use crate::stream::StreamFrame;
use crate::types::SampleSpec;
use std::collections::VecDeque;

/// Music input: native-format frames in, mix-format samples queued.
pub struct MusicSource {
    adapter: LinkAdapter,

    /// Interleaved stereo samples at the device rate
    queue: VecDeque<f32>,

    /// Set by the end-of-input push; no more frames may follow
    flushed: bool,

    failed: u64,
}

impl MusicSource {
    pub fn new(source: SampleSpec, target_rate: u32) -> Result<Self> {
        Ok(Self {
            adapter: LinkAdapter::new(source, target_rate)?,
            queue: VecDeque::new(),
            flushed: false,
            failed: 0,
        })
    }

    /// Push one decoded frame, or `None` to signal end of input.
    ///
    /// The end-of-input push flushes the adapter and terminates the lane;
    /// repeating it is a no-op. Pushing a frame after the flush is a state
    /// error.
    pub fn push(&mut self, frame: Option<&StreamFrame<'_>>) -> Result<()> {
        match frame {
            Some(frame) => {
                if self.flushed {
                    return Err(Error::InvalidState(
                        "music source already flushed".to_string(),
                    ));
                }
                if frame.spec != self.adapter.source_spec() {
                    return Err(Error::InvalidState(format!(
                        "frame format {:?} does not match music source {:?}",
                        frame.spec,
                        self.adapter.source_spec()
                    )));
                }
                let converted = self.adapter.process(frame.samples)?;
                self.queue.extend(converted);
                self.failed = 0;
                Ok(())
            }
            None => {
                if self.flushed {
                    return Ok(());
                }
                // Terminate the lane before the fallible flush so a
                // resampler error cannot leave the graph undrainable.
                self.flushed = true;
                self.failed = 0;
                let tail = self.adapter.flush()?;
                self.queue.extend(tail);
                Ok(())
            }
        }
    }

    /// Frames currently queued for the mixer.
    pub fn queued_frames(&self) -> usize {
        self.queue.len() / 2
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed
    }

    pub(crate) fn note_failed_request(&mut self) {
        self.failed += 1;
    }

    /// Pop one stereo frame for mixing.
    pub(crate) fn pop_frame(&mut self) -> (f32, f32) {
        let left = self.queue.pop_front().unwrap_or(0.0);
        let right = self.queue.pop_front().unwrap_or(0.0);
        (left, right)
    }
}

/// Effect input: pre-converted stereo frames, plus granted silence.
///
/// Pushing `None` does not terminate this lane. It grants enough silence to
/// cover the music samples currently queued, so the mixer can keep going,
/// and leaves the lane open for a real frame on a later push. The mixer's
/// duration-first policy makes this safe: playback length is decided by the
/// music lane alone.
pub struct EffectSource {
    /// Interleaved stereo samples at the device rate
    queue: VecDeque<f32>,

    /// Frames of granted silence, consumed after any queued samples
    credit: usize,

    failed: u64,
}

impl EffectSource {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            credit: 0,
            failed: 0,
        }
    }

    /// Push one effect frame, or `None` to cover the current music backlog
    /// with silence.
    ///
    /// `music_backlog` is the number of music frames queued at push time;
    /// the silence grant tops coverage up to exactly that amount.
    pub fn push(&mut self, frame: Option<&EffectFrame>, music_backlog: usize) {
        match frame {
            Some(frame) => {
                // A stray odd sample would swap left and right for every
                // frame after it; keep whole stereo frames only.
                let samples = frame.samples();
                let even = samples.len() & !1;
                self.queue.extend(samples[..even].iter().copied());
            }
            None => {
                let covered = self.covered_frames();
                if music_backlog > covered {
                    self.credit += music_backlog - covered;
                }
            }
        }
        self.failed = 0;
    }

    /// Frames this lane can currently cover: queued data plus silence credit.
    pub fn covered_frames(&self) -> usize {
        self.queue.len() / 2 + self.credit
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed
    }

    pub(crate) fn note_failed_request(&mut self) {
        self.failed += 1;
    }

    /// Pop one stereo frame for mixing. Queued data plays before credit:
    /// silence grants always cover music that was queued after the data.
    pub(crate) fn pop_frame(&mut self) -> (f32, f32) {
        if self.queue.len() >= 2 {
            let left = self.queue.pop_front().unwrap_or(0.0);
            let right = self.queue.pop_front().unwrap_or(0.0);
            (left, right)
        } else if self.credit > 0 {
            self.credit -= 1;
            (0.0, 0.0)
        } else {
            (0.0, 0.0)
        }
    }
}

impl Default for EffectSource {
    fn default() -> Self {
        Self::new()
    }
}
