//! Format adaptation for the music link
//!
//! The music source accepts frames in the stream's native format; the mixer
//! works in stereo f32 at the device rate. This adapter sits on the link
//! between them: it maps the native channel layout to stereo, then resamples
//! to the device rate with rubato.
//!
//! rubato's fixed-input resampler wants chunks of an exact size, while
//! decoded frames arrive in whatever size the codec produces. The adapter
//! buffers planar samples until a full chunk is available and drains the
//! remainder through a partial process on flush.

use crate::error::{Error, Result};
use crate::types::{SampleSpec, MIX_CHANNELS};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Input frames per resampler call.
const RESAMPLER_CHUNK: usize = 1024;

/// Converts native-format samples to stereo f32 at a target rate.
pub struct LinkAdapter {
    source: SampleSpec,
    target_rate: u32,

    /// Absent when source and target rates match
    resampler: Option<FastFixedIn<f32>>,

    /// Planar samples waiting for a full resampler chunk
    pending_left: Vec<f32>,
    pending_right: Vec<f32>,
}

impl LinkAdapter {
    /// Create an adapter from a source format to `target_rate`.
    pub fn new(source: SampleSpec, target_rate: u32) -> Result<Self> {
        if source.channels == 0 {
            return Err(Error::GraphConstruction(
                "source has zero channels".to_string(),
            ));
        }

        let resampler = if source.rate == target_rate {
            debug!("music link at {} Hz, no resampling", target_rate);
            None
        } else {
            debug!(
                "music link resampling {} Hz -> {} Hz",
                source.rate, target_rate
            );
            let resampler = FastFixedIn::<f32>::new(
                target_rate as f64 / source.rate as f64,
                1.0, // fixed ratio
                PolynomialDegree::Septic,
                RESAMPLER_CHUNK,
                MIX_CHANNELS as usize,
            )
            .map_err(|e| Error::GraphConstruction(format!("failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self {
            source,
            target_rate,
            resampler,
            pending_left: Vec::new(),
            pending_right: Vec::new(),
        })
    }

    /// Source format this adapter was built for.
    pub fn source_spec(&self) -> SampleSpec {
        self.source
    }

    /// Target sample rate.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Adapt one native-format frame.
    ///
    /// Returns interleaved stereo samples at the target rate. The result may
    /// be empty while the resampler accumulates a full chunk; the remainder
    /// comes out of [`LinkAdapter::flush`].
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let resampler = match self.resampler.as_mut() {
            Some(resampler) => resampler,
            None => {
                // Same rate: channel mapping is the whole job
                let mut out = Vec::with_capacity(samples.len() / self.source.channels as usize * 2);
                map_to_stereo_interleaved(samples, self.source.channels, &mut out);
                return Ok(out);
            }
        };

        map_to_stereo_planar(
            samples,
            self.source.channels,
            &mut self.pending_left,
            &mut self.pending_right,
        );

        let mut out = Vec::new();
        while self.pending_left.len() >= RESAMPLER_CHUNK {
            let planar = resampler
                .process(
                    &[
                        &self.pending_left[..RESAMPLER_CHUNK],
                        &self.pending_right[..RESAMPLER_CHUNK],
                    ],
                    None,
                )
                .map_err(|e| Error::Decode(format!("resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
            self.pending_left.drain(..RESAMPLER_CHUNK);
            self.pending_right.drain(..RESAMPLER_CHUNK);
        }

        Ok(out)
    }

    /// Drain buffered samples at end of input.
    ///
    /// The resampler pads a short final chunk up to its fixed input size,
    /// so the raw flush output runs past the real signal. Only the frames
    /// corresponding to the buffered input, plus the resampler's own
    /// delay, are kept; the padding is cut off before it can reach the
    /// music lane and stretch playback.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let resampler = match self.resampler.as_mut() {
            Some(resampler) => resampler,
            None => return Ok(Vec::new()),
        };

        let ratio = self.target_rate as f64 / self.source.rate as f64;
        let expected =
            (self.pending_left.len() as f64 * ratio).ceil() as usize + resampler.output_delay();

        let mut out = Vec::new();
        if !self.pending_left.is_empty() {
            let planar = resampler
                .process_partial(
                    Some(&[&self.pending_left[..], &self.pending_right[..]]),
                    None,
                )
                .map_err(|e| Error::Decode(format!("resampler flush failed: {}", e)))?;
            interleave_into(&planar, &mut out);
            self.pending_left.clear();
            self.pending_right.clear();
        }

        // The padded chunk usually covers the delay tail already; drain
        // with an empty partial call only when it does not.
        if out.len() / 2 < expected {
            let tail = resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| Error::Decode(format!("resampler flush failed: {}", e)))?;
            interleave_into(&tail, &mut out);
        }

        out.truncate(expected * 2);
        Ok(out)
    }
}

/// Map interleaved native channels to interleaved stereo.
///
/// Mono duplicates to both channels; layouts wider than stereo keep the
/// front pair and drop the rest.
fn map_to_stereo_interleaved(samples: &[f32], channels: u16, out: &mut Vec<f32>) {
    let step = channels as usize;
    match channels {
        1 => {
            for sample in samples {
                out.push(*sample);
                out.push(*sample);
            }
        }
        2 => out.extend_from_slice(samples),
        _ => {
            for frame in samples.chunks_exact(step) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

/// Map interleaved native channels to planar stereo, appending.
fn map_to_stereo_planar(samples: &[f32], channels: u16, left: &mut Vec<f32>, right: &mut Vec<f32>) {
    let step = channels as usize;
    match channels {
        1 => {
            for sample in samples {
                left.push(*sample);
                right.push(*sample);
            }
        }
        _ => {
            for frame in samples.chunks_exact(step) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
        }
    }
}

/// Convert planar stereo to interleaved, appending.
fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    if planar.len() < 2 {
        return;
    }
    let frames = planar[0].len().min(planar[1].len());
    out.reserve(frames * 2);
    for frame_idx in 0..frames {
        out.push(planar[0][frame_idx]);
        out.push(planar[1][frame_idx]);
    }
}
