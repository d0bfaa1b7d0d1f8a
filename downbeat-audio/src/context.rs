//! Audio context lifecycle
//!
//! One opened piece of music with its device binding, filter graph and
//! effect lane. The context owns the control-thread half of playback:
//! state transitions, position queries, volume, effect offers. Everything
//! that touches samples lives in the [`PlaybackPump`], which moves into
//! the device callback at open time and never comes back.

use crate::clock::PlaybackClock;
use crate::error::{Error, Result};
use crate::graph::FilterGraph;
use crate::output::AudioOutput;
use crate::pump::PlaybackPump;
use crate::sample::{EffectFrame, EffectProducer, EffectSlot};
use crate::stream::AudioStream;
use crate::types::{ContextConfig, DeviceSpec};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Control-side view of where playback stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Opened and primed, device held paused
    Ready,
    /// Device callback running
    Playing,
    /// Device callback suspended, decode state intact
    Paused,
    /// Graph fully drained; terminal apart from close
    Finished,
    /// Device stopped and resources released
    Closed,
}

pub struct AudioContext {
    // Field order matters on drop: the output goes first, which stops the
    // callback and with it releases the pump, graph and decoder before
    // anything else.
    output: AudioOutput,
    effects: EffectProducer,
    clock: Arc<PlaybackClock>,
    state: ContextState,
}

impl AudioContext {
    /// Open `path` with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &ContextConfig::default())
    }

    /// Open a music resource and bind an output device, ready to play.
    ///
    /// Runs the whole construction chain: probe and decoder, device
    /// negotiation seeded with the stream's native format, filter graph
    /// sized to the granted buffer, and the device stream built around the
    /// pump but left paused. Any failure releases the pieces built so far
    /// and surfaces as a single error.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &ContextConfig) -> Result<Self> {
        let stream = AudioStream::open(path)?;
        let mut output = AudioOutput::open(stream.spec(), config)?;

        let granted = output.granted();
        let graph = FilterGraph::build(stream.spec(), granted)?;

        let clock = Arc::new(PlaybackClock::new());
        let (effects, consumer) = EffectSlot::new().split();
        let pump = PlaybackPump::new(stream, graph, Arc::clone(&clock), consumer);

        output.start(pump)?;
        info!("audio context ready");

        Ok(Self {
            output,
            effects,
            clock,
            state: ContextState::Ready,
        })
    }

    /// Start or resume playback.
    pub fn play(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Ready | ContextState::Paused => {
                self.output.play()?;
                self.state = ContextState::Playing;
                Ok(())
            }
            ContextState::Playing => Ok(()),
            other => Err(Error::InvalidState(format!("cannot play from {:?}", other))),
        }
    }

    /// Suspend the device callback.
    ///
    /// Decode state is untouched, so a later [`AudioContext::play`]
    /// resumes exactly where playback stopped.
    pub fn pause(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Playing => {
                self.output.pause()?;
                self.state = ContextState::Paused;
                Ok(())
            }
            ContextState::Ready | ContextState::Paused => Ok(()),
            other => Err(Error::InvalidState(format!("cannot pause from {:?}", other))),
        }
    }

    /// Effective lifecycle state, folding in what the callback reported.
    pub fn state(&self) -> ContextState {
        match self.state {
            ContextState::Ready | ContextState::Playing | ContextState::Paused
                if self.clock.is_finished() =>
            {
                ContextState::Finished
            }
            state => state,
        }
    }

    /// Playback position in seconds of media time.
    ///
    /// Updated by the callback from decoded frame timestamps, so it can
    /// lag the speaker by up to one device buffer, and it holds its last
    /// value once playback finishes.
    pub fn position(&self) -> f64 {
        self.clock.position()
    }

    /// Whether the music has been fully decoded, mixed and handed to the
    /// device. Latches; never reverts.
    pub fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    /// True after any non-recoverable playback error, whether from the
    /// decode path or from the device itself.
    pub fn has_error(&self) -> bool {
        self.clock.has_error() || self.output.has_error()
    }

    /// Offer a sound effect for mixing into upcoming device buffers.
    ///
    /// At most one effect is pending at a time: the offer is rejected
    /// (returns `false`) while a previously offered frame has not been
    /// picked up by the callback, and always once playback is over.
    pub fn offer_effect(&mut self, frame: Arc<EffectFrame>) -> bool {
        if matches!(self.state(), ContextState::Finished | ContextState::Closed) {
            return false;
        }
        self.effects.offer(frame)
    }

    /// Set output volume, clamped to [0.0, 1.0].
    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume);
    }

    /// Current output volume.
    pub fn volume(&self) -> f32 {
        self.output.volume()
    }

    /// Format the device granted; effect frames must be decoded to this.
    pub fn device_spec(&self) -> DeviceSpec {
        self.output.granted()
    }

    /// Stop the device and release everything. Idempotent.
    ///
    /// The device stops first, which tears down the callback and the pump
    /// inside it; only then do graph and decoder go away, so no callback
    /// can ever observe a half-released context.
    pub fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        info!("closing audio context");
        self.output.stop();
        self.state = ContextState::Closed;
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
