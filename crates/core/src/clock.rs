// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic millisecond clock behind a trait for testable timers.

use std::sync::Arc;

use nix::time::ClockId;
use parking_lot::Mutex;

/// Milliseconds on the supervisor's monotonic timeline.
///
/// All deadlines and timeouts are expressed in this unit; `0` is reserved
/// as the "unset" sentinel for lazily-computed deadlines.
pub type Millis = i64;

/// A clock that provides monotonic milliseconds since boot.
pub trait Clock: Clone + Send + Sync {
    fn now_ms(&self) -> Millis;
}

// Prefer a clock that does not tick while the machine is suspended;
// everything measured against it is a delay.
#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
const DELAY_CLOCK: ClockId = ClockId::CLOCK_UPTIME;
#[cfg(not(any(target_os = "freebsd", target_os = "openbsd")))]
const DELAY_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

/// Real system clock
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        nix::time::clock_gettime(DELAY_CLOCK)
            .map(|ts| ts.tv_sec() as Millis * 1000 + ts.tv_nsec() as Millis / 1_000_000)
            .unwrap_or_default()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Millis>>,
}

impl FakeClock {
    /// Starts well away from zero so the "unset deadline" sentinel can
    /// never be confused with a real timestamp.
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(1_000_000)) }
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, ms: Millis) {
        *self.current.lock() += ms;
    }

    /// Set the clock to an absolute timestamp
    pub fn set(&self, ms: Millis) {
        *self.current.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> Millis {
        *self.current.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
