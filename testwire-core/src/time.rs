// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for stamping run events.
//!
//! Events carry both a wall-clock timestamp and the time elapsed since the
//! run started. For that we pair a `DateTime` (realtime clock) with an
//! `Instant` (monotonic clock): the realtime clock can jump around, the
//! monotonic one cannot.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// A started stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls happen imperceptibly close to each other,
            // which is good enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_monotonic() {
        let start = stopwatch();
        let first = start.elapsed();
        let second = start.elapsed();
        assert!(second >= first);
        assert!(start.start_time() <= Local::now());
    }
}
