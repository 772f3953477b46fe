//! Millisecond time source.
//!
//! The control loop passes `now_ms` into every `update`, but the startup
//! calibration routines sample at a fixed cadence and need to wait between
//! samples.  Both come from a [`Clock`] so tests can run them instantly.

use std::time::{Duration, Instant};

/// A monotonic millisecond clock with a blocking delay.
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Block for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u64);
}

/// Wall-clock implementation backed by [`Instant`] and `thread::sleep`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
