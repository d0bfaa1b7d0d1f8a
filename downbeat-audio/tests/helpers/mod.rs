//! Test helper modules for downbeat-audio integration tests

// Each test binary compiles this module separately and uses a different
// subset of the generators.
#![allow(dead_code)]

pub mod audio_generator;
