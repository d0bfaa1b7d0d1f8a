//! Fixed-topology mixing graph
//!
//! Five nodes wired at construction time and never re-linked:
//!
//! ```text
//! music source ──▶
//!                  mixer ──▶ converter ──▶ sink
//! effect source ─▶
//! ```
//!
//! The music source adapts decoder-native frames to the mix format; the
//! effect source takes pre-converted frames. The mixer sums at unity gain
//! with duration decided by the music lane, the converter maps to the
//! granted device layout, and the sink chunks the result into exact
//! device buffers.
//!
//! The graph is single-threaded by design: the playback callback owns it
//! and alternates pushes and pulls. Starvation is reported per input
//! through failed-request counters so the caller knows which lane to feed.

pub mod adapt;
pub mod convert;
pub mod mixer;
pub mod sink;
pub mod source;

pub use adapt::LinkAdapter;

use crate::error::{Error, Result};
use crate::sample::EffectFrame;
use crate::stream::StreamFrame;
use crate::types::{DeviceSpec, SampleSpec};
use convert::OutputConverter;
use mixer::Mixer;
use sink::FrameSink;
use source::{EffectSource, MusicSource};
use tracing::debug;

/// Graph inputs addressable by the feeding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphInput {
    Music,
    Effect,
}

/// Result of pulling the sink.
#[derive(Debug, PartialEq)]
pub enum GraphPull<'a> {
    /// Exactly one device buffer of interleaved samples
    Frame(&'a [f32]),

    /// One or both inputs need a push before output can continue
    Starved,

    /// The music lane is flushed and every buffered sample has been emitted
    EndOfStream,
}

/// The mixing graph from decoder output to device buffers.
pub struct FilterGraph {
    music: MusicSource,
    effect: EffectSource,
    mixer: Mixer,
    converter: OutputConverter,
    sink: FrameSink,
    device: DeviceSpec,
}

impl FilterGraph {
    /// Build the graph for a decoder format and a granted device format.
    ///
    /// Topology and formats are fixed from here on; failure leaves nothing
    /// allocated. The device spec must come from an opened device so the
    /// sink's frame size matches what the callback will be asked to fill.
    pub fn build(source: SampleSpec, device: DeviceSpec) -> Result<Self> {
        if device.channels == 0 {
            return Err(Error::GraphConstruction(
                "device reports zero channels".to_string(),
            ));
        }
        if device.buffer_frames == 0 {
            return Err(Error::GraphConstruction(
                "device reports zero buffer size".to_string(),
            ));
        }

        debug!(
            "building graph: {} Hz {} ch -> {} Hz {} ch, {} frames/buffer",
            source.rate, source.channels, device.rate, device.channels, device.buffer_frames
        );

        Ok(Self {
            music: MusicSource::new(source, device.rate)?,
            effect: EffectSource::new(),
            mixer: Mixer::new(),
            converter: OutputConverter::new(device.channels),
            sink: FrameSink::new(device.samples_per_buffer()),
            device,
        })
    }

    /// Device format the graph emits.
    pub fn device_spec(&self) -> DeviceSpec {
        self.device
    }

    /// Push a music frame, or `None` to flush the music lane.
    ///
    /// Flushing is terminal for the lane and idempotent. After it, the
    /// graph drains to [`GraphPull::EndOfStream`] regardless of the effect
    /// lane.
    pub fn push_music(&mut self, frame: Option<&StreamFrame<'_>>) -> Result<()> {
        self.music.push(frame)
    }

    /// Push an effect frame, or `None` to cover the current music backlog
    /// with silence.
    ///
    /// Unlike the music lane the `None` push is not terminal: a later frame
    /// still plays, starting where the silence grant ended.
    pub fn push_effect(&mut self, frame: Option<&EffectFrame>) {
        let backlog = self.music.queued_frames();
        self.effect.push(frame, backlog);
    }

    /// Failed pull attempts on an input since it was last fed.
    ///
    /// Nonzero means the lane starved the graph; the count resets on every
    /// push to that lane. A flushed music lane never reports failures, so a
    /// feeding loop keyed on this counter stops touching the decoder once
    /// the stream has ended.
    pub fn failed_requests(&self, input: GraphInput) -> u64 {
        match input {
            GraphInput::Music => self.music.failed_requests(),
            GraphInput::Effect => self.effect.failed_requests(),
        }
    }

    /// Pull one device buffer from the sink.
    pub fn pull(&mut self) -> GraphPull<'_> {
        self.transfer();

        if !self.sink.frame_ready() {
            let draining = self.music.is_flushed() && self.music.queued_frames() == 0;
            if draining {
                if self.sink.is_empty() {
                    return GraphPull::EndOfStream;
                }
                // Final partial buffer: complete it with silence
                self.sink.pad_to_frame();
            } else {
                self.note_starvation();
                return GraphPull::Starved;
            }
        }

        match self.sink.take_frame() {
            Some(frame) => GraphPull::Frame(frame),
            None => GraphPull::EndOfStream,
        }
    }

    /// Move every currently mixable frame through mixer and converter into
    /// the sink.
    fn transfer(&mut self) {
        let mixable = self
            .music
            .queued_frames()
            .min(self.effect.covered_frames());
        if mixable == 0 {
            return;
        }

        let stereo = self.mixer.mix(&mut self.music, &mut self.effect, mixable);
        let converted = self.converter.convert(stereo);
        self.sink.push_samples(converted);
    }

    /// Record which inputs block the next output frame.
    fn note_starvation(&mut self) {
        let missing = self.sink.deficit() / self.device.channels as usize;

        if !self.music.is_flushed() && self.music.queued_frames() < missing {
            self.music.note_failed_request();
        }

        // The effect lane must cover whatever music will be mixed next:
        // a full buffer normally, or just the remainder once the music
        // lane is flushed.
        let effect_target = if self.music.is_flushed() {
            self.music.queued_frames().min(missing)
        } else {
            missing
        };
        if self.effect.covered_frames() < effect_target {
            self.effect.note_failed_request();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamFrame;

    const DEVICE: DeviceSpec = DeviceSpec {
        rate: 44100,
        channels: 2,
        buffer_frames: 4,
    };

    fn stereo_spec() -> SampleSpec {
        SampleSpec { rate: 44100, channels: 2 }
    }

    fn push_frames(graph: &mut FilterGraph, samples: &[f32]) {
        let frame = StreamFrame {
            samples,
            spec: stereo_spec(),
            timestamp: 0.0,
        };
        graph.push_music(Some(&frame)).unwrap();
    }

    #[test]
    fn test_pull_before_any_push_starves_both() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();

        assert_eq!(graph.pull(), GraphPull::Starved);
        assert!(graph.failed_requests(GraphInput::Music) > 0);
        assert!(graph.failed_requests(GraphInput::Effect) > 0);
    }

    #[test]
    fn test_push_resets_failed_count() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();
        assert_eq!(graph.pull(), GraphPull::Starved);

        push_frames(&mut graph, &[0.1; 8]);
        assert_eq!(graph.failed_requests(GraphInput::Music), 0);

        graph.push_effect(None);
        assert_eq!(graph.failed_requests(GraphInput::Effect), 0);
    }

    #[test]
    fn test_full_cycle_emits_exact_buffers() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();

        // 6 frames of music; buffer is 4 frames
        push_frames(&mut graph, &[0.25; 12]);
        graph.push_effect(None);

        match graph.pull() {
            GraphPull::Frame(frame) => {
                assert_eq!(frame.len(), DEVICE.samples_per_buffer());
                assert!(frame.iter().all(|s| (*s - 0.25).abs() < 1e-6));
            }
            other => panic!("expected frame, got {:?}", other),
        }

        // 2 frames left: starved until the lane is fed or flushed
        assert_eq!(graph.pull(), GraphPull::Starved);
        assert!(graph.failed_requests(GraphInput::Music) > 0);
    }

    #[test]
    fn test_flush_pads_final_buffer_and_ends() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();

        // 5 frames: one full buffer plus one frame of remainder
        push_frames(&mut graph, &[0.5; 10]);
        graph.push_effect(None);
        graph.push_music(None).unwrap();

        match graph.pull() {
            GraphPull::Frame(frame) => assert_eq!(frame.len(), 8),
            other => panic!("expected frame, got {:?}", other),
        }

        // Remainder comes out zero-padded to a full buffer
        match graph.pull() {
            GraphPull::Frame(frame) => {
                assert_eq!(frame.len(), 8);
                assert_eq!(&frame[..2], &[0.5, 0.5]);
                assert!(frame[2..].iter().all(|s| *s == 0.0));
            }
            other => panic!("expected padded frame, got {:?}", other),
        }

        assert_eq!(graph.pull(), GraphPull::EndOfStream);
        assert_eq!(graph.pull(), GraphPull::EndOfStream);
    }

    #[test]
    fn test_flushed_music_never_reports_failures() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();
        push_frames(&mut graph, &[0.1; 4]);
        graph.push_music(None).unwrap();

        // Effect lane still starves the remaining two frames
        assert_eq!(graph.pull(), GraphPull::Starved);
        assert_eq!(graph.failed_requests(GraphInput::Music), 0);
        assert!(graph.failed_requests(GraphInput::Effect) > 0);

        graph.push_effect(None);
        match graph.pull() {
            GraphPull::Frame(frame) => assert_eq!(frame.len(), 8),
            other => panic!("expected padded frame, got {:?}", other),
        }
        assert_eq!(graph.pull(), GraphPull::EndOfStream);
    }

    #[test]
    fn test_effect_mixes_into_music() {
        let mut graph = FilterGraph::build(stereo_spec(), DEVICE).unwrap();

        push_frames(&mut graph, &[0.25; 8]);
        graph.push_effect(Some(&EffectFrame::from_samples(vec![0.5; 4])));
        // Cover the remaining two frames with silence
        graph.push_effect(None);

        match graph.pull() {
            GraphPull::Frame(frame) => {
                assert_eq!(&frame[..4], &[0.75, 0.75, 0.75, 0.75]);
                assert_eq!(&frame[4..], &[0.25, 0.25, 0.25, 0.25]);
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_converter_applies_device_layout() {
        let mono_device = DeviceSpec {
            rate: 44100,
            channels: 1,
            buffer_frames: 4,
        };
        let mut graph = FilterGraph::build(stereo_spec(), mono_device).unwrap();

        push_frames(&mut graph, &[0.2, 0.4, 0.2, 0.4, 0.2, 0.4, 0.2, 0.4]);
        graph.push_effect(None);

        match graph.pull() {
            GraphPull::Frame(frame) => {
                assert_eq!(frame.len(), 4);
                assert!(frame.iter().all(|s| (*s - 0.3).abs() < 1e-6));
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_degenerate_device() {
        let bad = DeviceSpec { rate: 44100, channels: 0, buffer_frames: 4 };
        assert!(matches!(
            FilterGraph::build(stereo_spec(), bad),
            Err(Error::GraphConstruction(_))
        ));

        let bad = DeviceSpec { rate: 44100, channels: 2, buffer_frames: 0 };
        assert!(matches!(
            FilterGraph::build(stereo_spec(), bad),
            Err(Error::GraphConstruction(_))
        ));
    }
}
