//! Compressed audio stream decoding using symphonia
//!
//! Opens a media file, selects its first audio track and serves decoded
//! PCM frames one at a time. Frames are produced in the stream's native
//! format; rate and channel adaptation happen downstream in the filter
//! graph.
//!
//! The stream owns a single reusable sample buffer. Each call to
//! [`AudioStream::next_frame`] overwrites it, so a returned frame is only
//! valid until the next call, which the borrow on [`StreamFrame`] enforces.

use crate::error::{Error, Result};
use crate::types::SampleSpec;
use std::path::Path;
use std::sync::OnceLock;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecRegistry, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, info, warn};

/// Consecutive corrupt packets tolerated before the stream gives up.
const MAX_DECODE_RETRIES: usize = 3;

/// Get the shared codec registry.
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<symphonia::default::codecs::MpaDecoder>();
        registry.register_all::<symphonia::default::codecs::PcmDecoder>();
        registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
        registry.register_all::<symphonia::default::codecs::FlacDecoder>();
        registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
        registry.register_all::<symphonia::default::codecs::AacDecoder>();
        registry
    })
}

/// Classify a failure to decode the very first frame.
///
/// `open` primes one frame, so decode errors can surface before the caller
/// ever pulls; those belong to the open-time taxonomy, not the runtime one.
fn prime_error(e: Error) -> Error {
    Error::DecoderInit(format!("failed to decode first frame: {}", e))
}

/// Initialize codec support.
///
/// Idempotent: the first call builds the codec registry, later calls are
/// no-ops. [`AudioStream::open`] calls it implicitly, so this exists for
/// callers that want the setup cost paid at program startup rather than
/// when the first file is opened.
pub fn init() {
    let _ = codec_registry();
}

/// One decoded frame, borrowed from the stream's internal buffer.
#[derive(Debug, Clone, Copy)]
pub struct StreamFrame<'a> {
    /// Interleaved samples in the stream's native channel order
    pub samples: &'a [f32],

    /// Native format of the stream
    pub spec: SampleSpec,

    /// Presentation time of this frame in seconds from the start of the
    /// stream, as declared by the container
    pub timestamp: f64,
}

impl StreamFrame<'_> {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }
}

/// Result of pulling one frame from a stream.
#[derive(Debug)]
pub enum NextFrame<'a> {
    /// A decoded frame is available
    Frame(StreamFrame<'a>),

    /// All packets have been read and decoded; no more frames will come
    EndOfStream,
}

/// A demuxed and decoded audio stream read incrementally from a file.
pub struct AudioStream {
    reader: Option<Box<dyn FormatReader>>,
    decoder: Option<Box<dyn Decoder>>,
    track_id: u32,
    time_base: Option<TimeBase>,
    spec: SampleSpec,

    /// Reusable output buffer, allocated on the first decoded frame
    buffer: Option<SampleBuffer<f32>>,
    buffer_frames: u64,
    buffer_spec: Option<SignalSpec>,

    /// Timestamp of the frame currently in `buffer`
    timestamp: f64,

    /// Set when `open` pre-decoded a frame that `next_frame` has not
    /// handed out yet
    primed: bool,

    at_end: bool,
}

impl AudioStream {
    /// Open an audio file and prepare it for decoding.
    ///
    /// Probes the container, picks the first audio track, builds a decoder
    /// for it and pre-decodes one frame, so format problems surface here
    /// instead of in the playback path.
    ///
    /// # Errors
    /// - [`Error::ResourceOpen`] if the file cannot be opened or probed
    /// - [`Error::NoAudioStream`] if no decodable track exists
    /// - [`Error::UnsupportedFormat`] if the track omits rate or channels
    /// - [`Error::DecoderInit`] if the decoder cannot be constructed or
    ///   fails on the very first frame
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        init();

        let path = path.as_ref();
        debug!("Opening audio stream: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::ResourceOpen(format!("{}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Help the probe with the file extension when there is one
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
            hint.with_extension(extension);
        }

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| {
                Error::ResourceOpen(format!("failed to probe {}: {}", path.display(), e))
            })?;

        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::NoAudioStream(path.display().to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::UnsupportedFormat("sample rate not declared".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::UnsupportedFormat("channel layout not declared".to_string()))?;
        let spec = SampleSpec { rate, channels };

        let decoder = codec_registry()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::DecoderInit(format!("{}", e)))?;

        let codec_name = codec_registry()
            .get_codec(codec_params.codec)
            .map(|d| d.long_name)
            .unwrap_or("unknown");
        let duration = codec_params
            .n_frames
            .map(|frames| frames as f64 / rate as f64);
        match duration {
            Some(seconds) => info!(
                "audio stream: codec={}, rate={} Hz, channels={}, duration={:.1} s",
                codec_name, rate, channels, seconds
            ),
            None => info!(
                "audio stream: codec={}, rate={} Hz, channels={}, duration unknown",
                codec_name, rate, channels
            ),
        }

        let mut stream = Self {
            reader: Some(reader),
            decoder: Some(decoder),
            track_id,
            time_base: codec_params.time_base,
            spec,
            buffer: None,
            buffer_frames: 0,
            buffer_spec: None,
            timestamp: 0.0,
            primed: false,
            at_end: false,
        };

        // Prime one frame. An empty stream is not an error here; the first
        // next_frame call will report end of stream. A stream that cannot
        // decode its first frame is a construction failure, not a mid-play
        // decode error.
        stream.primed = stream.advance().map_err(prime_error)?;

        Ok(stream)
    }

    /// Native format of the stream.
    pub fn spec(&self) -> SampleSpec {
        self.spec
    }

    /// Pull the next decoded frame.
    ///
    /// The returned frame borrows the stream's internal buffer and stays
    /// valid until the next call. After the last packet has been decoded,
    /// every call returns [`NextFrame::EndOfStream`].
    pub fn next_frame(&mut self) -> Result<NextFrame<'_>> {
        if self.primed {
            self.primed = false;
        } else if !self.advance()? {
            return Ok(NextFrame::EndOfStream);
        }

        match self.buffer.as_ref() {
            Some(buffer) => Ok(NextFrame::Frame(StreamFrame {
                samples: buffer.samples(),
                spec: self.spec,
                timestamp: self.timestamp,
            })),
            None => Ok(NextFrame::EndOfStream),
        }
    }

    /// Release the decoder and demuxer.
    ///
    /// Idempotent; pulling from a closed stream reports end of stream.
    /// Dropping the stream releases the same resources, this exists so a
    /// caller can pick the release point deterministically.
    pub fn close(&mut self) {
        // Release in reverse order of construction: decoder, then demuxer.
        self.decoder.take();
        self.reader.take();
        self.buffer = None;
        self.buffer_frames = 0;
        self.buffer_spec = None;
        self.primed = false;
        self.at_end = true;
    }

    /// Decode the next frame of the selected track into the internal
    /// buffer. Returns Ok(false) once the stream is exhausted or closed.
    fn advance(&mut self) -> Result<bool> {
        if self.at_end {
            return Ok(false);
        }
        let (reader, decoder) = match (self.reader.as_mut(), self.decoder.as_mut()) {
            (Some(reader), Some(decoder)) => (reader, decoder),
            _ => return Ok(false),
        };

        let mut decode_errors: usize = 0;
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    self.at_end = true;
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("failed to read packet: {}", e)));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }

                    let spec = *decoded.spec();
                    if spec.rate != self.spec.rate
                        || spec.channels.count() as u16 != self.spec.channels
                    {
                        return Err(Error::Decode(
                            "stream format changed mid-stream".to_string(),
                        ));
                    }

                    let frames = decoded.capacity() as u64;
                    let needs_alloc = match self.buffer {
                        Some(_) => self.buffer_frames < frames || self.buffer_spec != Some(spec),
                        None => true,
                    };
                    if needs_alloc {
                        self.buffer = Some(SampleBuffer::new(frames, spec));
                        self.buffer_frames = frames;
                        self.buffer_spec = Some(spec);
                    }
                    if let Some(buffer) = self.buffer.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                    }

                    if let Some(time_base) = self.time_base {
                        let time = time_base.calc_time(packet.ts());
                        self.timestamp = time.seconds as f64 + time.frac;
                    }

                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    decode_errors += 1;
                    if decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::Decode(format!("too many corrupt packets: {}", e)));
                    }
                    warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("{}", e)));
                }
            }
        }
    }
}

impl std::fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStream")
            .field("track_id", &self.track_id)
            .field("spec", &self.spec)
            .field("primed", &self.primed)
            .field("at_end", &self.at_end)
            .field("closed", &self.reader.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_prime_error_stays_in_open_taxonomy() {
        let wrapped = prime_error(Error::Decode("too many corrupt packets".to_string()));
        assert!(matches!(wrapped, Error::DecoderInit(_)));

        let wrapped = prime_error(Error::Decode("failed to read packet".to_string()));
        assert!(matches!(wrapped, Error::DecoderInit(_)));
    }

    #[test]
    fn test_open_missing_file() {
        let err = AudioStream::open("/nonexistent/missing.mp3").unwrap_err();
        assert!(matches!(err, Error::ResourceOpen(_)));
    }

    // Decoding real files is covered by the integration tests, which
    // generate WAV fixtures on the fly.
}
