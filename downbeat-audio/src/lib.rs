//! # Downbeat Audio
//!
//! Music playback core for a rhythm game: decode a compressed audio file,
//! mix one optional sound-effect lane into it through a small fixed filter
//! graph, and feed an output device from its own pull callback while
//! tracking the playback position the game clock hangs off.
//!
//! The usual way in is [`AudioContext`]:
//!
//! ```no_run
//! use downbeat_audio::AudioContext;
//!
//! # fn main() -> downbeat_audio::Result<()> {
//! let mut audio = AudioContext::open("song.mp3")?;
//! audio.play()?;
//! while !audio.is_finished() {
//!     println!("at {:.2}s", audio.position());
//!     std::thread::sleep(std::time::Duration::from_millis(250));
//! }
//! audio.close();
//! # Ok(())
//! # }
//! ```
//!
//! The decode and mix machinery underneath ([`AudioStream`],
//! [`FilterGraph`], [`PlaybackPump`]) is public so it can also be driven
//! without a device, for tests or offline rendering.

pub mod clock;
pub mod context;
pub mod error;
pub mod graph;
pub mod output;
pub mod pump;
pub mod sample;
pub mod stream;
pub mod types;

pub use clock::PlaybackClock;
pub use context::{AudioContext, ContextState};
pub use error::{Error, Result};
pub use graph::{FilterGraph, GraphInput, GraphPull};
pub use output::AudioOutput;
pub use pump::PlaybackPump;
pub use sample::{load_effect, EffectConsumer, EffectFrame, EffectProducer, EffectSlot};
pub use stream::{init, AudioStream, NextFrame, StreamFrame};
pub use types::{ContextConfig, DeviceSpec, SampleSpec};
