//! Sound effect loading and handoff
//!
//! Effects are short clips (hit sounds, combo breaks) decoded up front and
//! kept in memory, pre-converted to the mix format so the playback callback
//! never touches a decoder for them.
//!
//! Handoff to the callback goes through a single-slot lock-free queue: the
//! game thread offers a frame, the callback takes it on its next starvation
//! round. A second offer while one is pending is rejected, which keeps the
//! policy deterministic and both sides wait-free.

use crate::error::Result;
use crate::graph::LinkAdapter;
use crate::stream::{AudioStream, NextFrame};
use crate::types::DeviceSpec;
use ringbuf::{traits::*, HeapRb};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A fully decoded effect, interleaved stereo at the device rate.
#[derive(Debug, Clone)]
pub struct EffectFrame {
    samples: Vec<f32>,
}

impl EffectFrame {
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Decode an effect file and convert it to the device format.
///
/// Runs the whole file through the same link adapter the music lane uses,
/// so the result is ready for [`crate::graph::FilterGraph::push_effect`]
/// without further work in the callback.
pub fn load_effect<P: AsRef<Path>>(path: P, device: &DeviceSpec) -> Result<Arc<EffectFrame>> {
    let path = path.as_ref();
    let mut stream = AudioStream::open(path)?;
    let mut adapter = LinkAdapter::new(stream.spec(), device.rate)?;

    let mut samples = Vec::new();
    loop {
        match stream.next_frame()? {
            NextFrame::Frame(frame) => {
                samples.extend(adapter.process(frame.samples)?);
            }
            NextFrame::EndOfStream => break,
        }
    }
    samples.extend(adapter.flush()?);
    stream.close();

    if samples.is_empty() {
        warn!("effect {} decoded to zero samples", path.display());
    } else {
        debug!(
            "loaded effect {}: {} frames at {} Hz",
            path.display(),
            samples.len() / 2,
            device.rate
        );
    }

    Ok(Arc::new(EffectFrame::from_samples(samples)))
}

/// Single-slot handoff between the game thread and the playback callback.
pub struct EffectSlot {
    buffer: HeapRb<Arc<EffectFrame>>,
}

impl EffectSlot {
    pub fn new() -> Self {
        Self {
            // Capacity one: at most a single pending offer
            buffer: HeapRb::new(1),
        }
    }

    /// Split into the offering and consuming halves.
    pub fn split(self) -> (EffectProducer, EffectConsumer) {
        let (producer, consumer) = self.buffer.split();
        let rejected = Arc::new(AtomicU64::new(0));

        (
            EffectProducer {
                producer,
                rejected: Arc::clone(&rejected),
            },
            EffectConsumer { consumer },
        )
    }
}

impl Default for EffectSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Offering half, held by the control thread.
pub struct EffectProducer {
    producer: ringbuf::HeapProd<Arc<EffectFrame>>,
    rejected: Arc<AtomicU64>,
}

impl EffectProducer {
    /// Offer a frame to be mixed in on the callback's next starvation round.
    ///
    /// Returns false if the previous offer has not been consumed yet; the
    /// frame is not queued in that case.
    pub fn offer(&mut self, frame: Arc<EffectFrame>) -> bool {
        match self.producer.try_push(frame) {
            Ok(()) => true,
            Err(_) => {
                let count = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("effect offer rejected, slot occupied (total: {})", count);
                false
            }
        }
    }

    /// Offers rejected because the slot was occupied.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Consuming half, owned by the playback callback.
pub struct EffectConsumer {
    consumer: ringbuf::HeapCons<Arc<EffectFrame>>,
}

impl EffectConsumer {
    /// Take the pending frame, if any. Lock-free, safe in the callback.
    pub fn take(&mut self) -> Option<Arc<EffectFrame>> {
        self.consumer.try_pop()
    }
}
