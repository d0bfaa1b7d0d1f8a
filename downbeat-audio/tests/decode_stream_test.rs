//! Integration tests for the stream decoder
//!
//! Drives AudioStream against generated WAV fixtures: format reporting,
//! full decode runs, end-of-stream behavior and failure modes.

mod helpers;

use downbeat_audio::{AudioStream, Error, NextFrame};
use helpers::audio_generator::{
    generate_mono_sine_wav, generate_sine_wav, TEST_SAMPLE_RATE,
};
use std::io::Write;
use tempfile::TempDir;

#[test]
fn test_open_reports_native_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 200, 440.0, 0.5).unwrap();

    let stream = AudioStream::open(&path).expect("open generated wav");
    assert_eq!(stream.spec().rate, TEST_SAMPLE_RATE);
    assert_eq!(stream.spec().channels, 2);
}

#[test]
fn test_open_reports_mono_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone_mono.wav");
    generate_mono_sine_wav(&path, 200, 440.0, 0.5).unwrap();

    let stream = AudioStream::open(&path).expect("open generated wav");
    assert_eq!(stream.spec().channels, 1);
}

#[test]
fn test_decode_runs_to_end_of_stream() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 500, 440.0, 0.5).unwrap();

    let mut stream = AudioStream::open(&path).expect("open generated wav");

    let mut total_frames = 0usize;
    let mut last_timestamp = 0.0f64;
    let mut saw_positive_timestamp = false;

    loop {
        match stream.next_frame().expect("decode") {
            NextFrame::Frame(frame) => {
                assert_eq!(frame.spec.rate, TEST_SAMPLE_RATE);
                assert_eq!(frame.spec.channels, 2);
                assert_eq!(frame.samples.len() % 2, 0, "interleaved stereo");
                assert!(
                    frame.timestamp >= last_timestamp,
                    "timestamps must not go backwards"
                );
                if frame.timestamp > 0.0 {
                    saw_positive_timestamp = true;
                }
                last_timestamp = frame.timestamp;
                total_frames += frame.frames();
            }
            NextFrame::EndOfStream => break,
        }
    }

    // 500 ms at 44.1 kHz, PCM decodes losslessly
    assert_eq!(total_frames, 22050);
    assert!(saw_positive_timestamp, "later packets carry real timestamps");
    assert!(last_timestamp < 0.5, "timestamps stay inside the media duration");
}

#[test]
fn test_end_of_stream_is_sticky() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 100, 440.0, 0.5).unwrap();

    let mut stream = AudioStream::open(&path).expect("open generated wav");
    loop {
        if matches!(stream.next_frame().expect("decode"), NextFrame::EndOfStream) {
            break;
        }
    }

    // Every later call keeps reporting end of stream
    for _ in 0..3 {
        assert!(matches!(
            stream.next_frame().expect("poll after end"),
            NextFrame::EndOfStream
        ));
    }
}

#[test]
fn test_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 100, 440.0, 0.5).unwrap();

    let mut stream = AudioStream::open(&path).expect("open generated wav");
    stream.close();
    stream.close();

    // A closed stream reads as exhausted, not as an error
    assert!(matches!(
        stream.next_frame().expect("poll after close"),
        NextFrame::EndOfStream
    ));
}

#[test]
fn test_open_missing_file_fails() {
    let result = AudioStream::open("/nonexistent/never-there.mp3");
    assert!(matches!(result, Err(Error::ResourceOpen(_))));
}

#[test]
fn test_open_rejects_non_audio_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not_audio.wav");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"this is not a media file, whatever the extension says")
        .unwrap();
    drop(file);

    let result = AudioStream::open(&path);
    assert!(matches!(result, Err(Error::ResourceOpen(_))));
}
