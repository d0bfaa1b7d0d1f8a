//! Shared playback clock
//!
//! The device callback is the single writer: it advances the position and
//! latches the finished/errored flags. Game-thread readers poll without
//! locking, so every field is an atomic. The f64 position travels as its
//! raw bit pattern inside an `AtomicU64`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free playback state shared between the callback and the caller.
#[derive(Debug)]
pub struct PlaybackClock {
    /// Current playback position in seconds, stored as f64 bits
    position_bits: AtomicU64,

    /// Set once the graph has drained after end of stream
    finished: AtomicBool,

    /// Set when the callback or the device reports an unrecoverable error
    errored: AtomicBool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            position_bits: AtomicU64::new(0f64.to_bits()),
            finished: AtomicBool::new(false),
            errored: AtomicBool::new(false),
        }
    }

    /// Update the position. Only the callback calls this.
    pub fn set_position(&self, seconds: f64) {
        self.position_bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Latest position in seconds.
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    /// Latch the finished flag. Never cleared.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Latch the error flag. Never cleared.
    pub fn mark_error(&self) {
        self.errored.store(true, Ordering::SeqCst);
    }

    pub fn has_error(&self) -> bool {
        self.errored.load(Ordering::SeqCst)
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_round_trip() {
        let clock = PlaybackClock::new();
        assert_eq!(clock.position(), 0.0);

        clock.set_position(12.345);
        assert_eq!(clock.position(), 12.345);

        clock.set_position(0.000_1);
        assert_eq!(clock.position(), 0.000_1);
    }

    #[test]
    fn test_flags_latch() {
        let clock = PlaybackClock::new();
        assert!(!clock.is_finished());
        assert!(!clock.has_error());

        clock.mark_finished();
        clock.mark_error();
        assert!(clock.is_finished());
        assert!(clock.has_error());

        // Latches stay set
        assert!(clock.is_finished());
        assert!(clock.has_error());
    }
}
