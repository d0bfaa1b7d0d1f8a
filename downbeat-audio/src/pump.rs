//! Playback pump: the hard-real-time fill path
//!
//! The device callback hands this a destination slice and it must come back
//! full, every time, without blocking. The pump pulls device buffers from
//! the filter graph and feeds whichever graph input starved, decoding music
//! packets on demand and draining the effect slot opportunistically.
//!
//! All decode work happens here on the callback thread. That is bounded by
//! how much compressed data one frame needs and is an accepted latency cost
//! of the design; the device buffer size is chosen to absorb it.
//!
//! Runtime failures never propagate out of the pump: it degrades to
//! silence, latches the error flag on the shared clock and lets the graph
//! drain to its end.

use crate::clock::PlaybackClock;
use crate::graph::{FilterGraph, GraphInput, GraphPull};
use crate::sample::EffectConsumer;
use crate::stream::{AudioStream, NextFrame};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives decoder and graph from inside the device callback.
pub struct PlaybackPump {
    // Field order fixes drop order: graph releases before the decoder it
    // was built from.
    graph: FilterGraph,
    stream: AudioStream,
    clock: Arc<PlaybackClock>,
    effects: EffectConsumer,

    /// Sink frame being copied out, for device requests that are not a
    /// whole buffer
    carry: Vec<f32>,
    carry_pos: usize,
}

impl PlaybackPump {
    pub fn new(
        stream: AudioStream,
        graph: FilterGraph,
        clock: Arc<PlaybackClock>,
        effects: EffectConsumer,
    ) -> Self {
        Self {
            graph,
            stream,
            clock,
            effects,
            carry: Vec::new(),
            carry_pos: 0,
        }
    }

    /// Fill `dest` completely with mixed samples, then silence.
    ///
    /// This is the whole hard-real-time contract: the slice is full when
    /// the call returns, no matter what happened underneath.
    pub fn fill(&mut self, dest: &mut [f32]) {
        let mut filled = 0;

        while filled < dest.len() {
            // Drain the carried sink frame first
            if self.carry_pos < self.carry.len() {
                let n = (dest.len() - filled).min(self.carry.len() - self.carry_pos);
                dest[filled..filled + n]
                    .copy_from_slice(&self.carry[self.carry_pos..self.carry_pos + n]);
                self.carry_pos += n;
                filled += n;
                continue;
            }

            if self.clock.is_finished() {
                break;
            }
            if !self.next_buffer() {
                break;
            }
        }

        // Fallthrough: whatever could not be produced becomes silence
        if filled < dest.len() {
            dest[filled..].fill(0.0);
        }

        // When this fill consumed the last carried frame, probe the graph
        // once more: a fill that drains the final frame also flips the
        // finished latch, instead of leaving that to the next callback.
        if self.carry_pos == self.carry.len() && !self.clock.is_finished() {
            match self.graph.pull() {
                GraphPull::Frame(frame) => {
                    self.carry.clear();
                    self.carry.extend_from_slice(frame);
                    self.carry_pos = 0;
                }
                GraphPull::Starved => {}
                GraphPull::EndOfStream => {
                    debug!("playback drained");
                    self.clock.mark_finished();
                }
            }
        }
    }

    /// Pull one device buffer from the graph into the carry, feeding
    /// starving inputs until it arrives. Returns false once the graph has
    /// drained.
    fn next_buffer(&mut self) -> bool {
        loop {
            match self.graph.pull() {
                GraphPull::Frame(frame) => {
                    self.carry.clear();
                    self.carry.extend_from_slice(frame);
                    self.carry_pos = 0;
                    return true;
                }
                GraphPull::Starved => {
                    self.feed();
                }
                GraphPull::EndOfStream => {
                    debug!("playback drained");
                    self.clock.mark_finished();
                    return false;
                }
            }
        }
    }

    /// Feed whichever graph inputs reported starvation.
    ///
    /// Music first: its push may grow the backlog that an effect silence
    /// grant has to cover. A flushed music lane stops reporting starvation,
    /// so the decoder is never touched again after end of stream.
    fn feed(&mut self) {
        if self.graph.failed_requests(GraphInput::Music) > 0 {
            let pushed = match self.stream.next_frame() {
                Ok(NextFrame::Frame(frame)) => {
                    // Placeholder timestamps at stream start stay at zero
                    if frame.timestamp > 0.0 {
                        self.clock.set_position(frame.timestamp);
                    }
                    self.graph.push_music(Some(&frame))
                }
                Ok(NextFrame::EndOfStream) => self.graph.push_music(None),
                Err(e) => {
                    warn!("decoder failed mid-stream: {}", e);
                    self.clock.mark_error();
                    self.graph.push_music(None)
                }
            };
            if let Err(e) = pushed {
                warn!("music lane push failed: {}", e);
                self.clock.mark_error();
                if let Err(e) = self.graph.push_music(None) {
                    warn!("music lane flush failed: {}", e);
                }
            }
        }

        if self.graph.failed_requests(GraphInput::Effect) > 0 {
            match self.effects.take() {
                Some(frame) => self.graph.push_effect(Some(&frame)),
                None => self.graph.push_effect(None),
            }
        }
    }
}
