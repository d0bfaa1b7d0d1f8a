//! Error types for downbeat-audio
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Errors split into two families: construction errors, returned while the
//! audio context is being opened (the caller still owns the thread and can
//! react), and runtime errors, which surface inside the device callback and
//! degrade to silence instead of propagating.

use thiserror::Error;

/// Main error type for downbeat-audio
#[derive(Error, Debug)]
pub enum Error {
    /// The media file could not be opened or probed as a container
    #[error("Cannot open resource: {0}")]
    ResourceOpen(String),

    /// The container holds no decodable audio track
    #[error("No audio stream found: {0}")]
    NoAudioStream(String),

    /// A decoder for the track's codec could not be constructed
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    /// The decoded sample format has no device mapping
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Building or configuring the filter graph failed
    #[error("Filter graph error: {0}")]
    GraphConstruction(String),

    /// Opening or starting the output device failed
    #[error("Audio device error: {0}")]
    DeviceOpen(String),

    /// Decoding a packet mid-stream failed fatally
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using downbeat-audio Error
pub type Result<T> = std::result::Result<T, Error>;
