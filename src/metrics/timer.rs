//! Timer metric
//!
//! A meter of calls plus a histogram of their durations in nanoseconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::{self, Clock};
use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::Meter;

/// Rate and duration distribution of timed events
#[derive(Debug)]
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_clock(clock::system())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::with_clock(clock),
            histogram: Histogram::new(),
        }
    }

    /// Record one event of the given duration
    pub fn update(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Run `f` and record how long it took
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.update(started.elapsed());
        result
    }

    /// Start timing; the event is recorded when the context stops or drops
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            started: Instant::now(),
            stopped: false,
        }
    }

    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// The call-rate meter
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    /// Durations in nanoseconds
    pub fn snapshot(&self) -> HistogramSnapshot {
        self.histogram.snapshot()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight timing started by [`Timer::start`]
#[must_use = "dropping the context immediately records a near-zero duration"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    started: Instant,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record the elapsed time and return it
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.stopped {
            self.stopped = true;
            self.timer.update(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.record();
    }
}
