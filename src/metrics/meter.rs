//! Meter metric
//!
//! Tracks a monotonic event count plus exponentially-weighted moving average
//! rates over 1, 5 and 15 minute windows and the mean rate since creation.
//! Rates are kept in events per second; reporters convert them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::clock::{self, Clock};

/// Interval between EWMA decay steps
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// EWMA
// =============================================================================

/// Exponentially-weighted moving average of an event rate
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_secs: f64,
    uncounted: AtomicU64,
    /// f64 bits, events per second
    rate: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    /// Create an EWMA with an explicit smoothing factor
    pub fn new(alpha: f64, interval: Duration) -> Self {
        Self {
            alpha,
            interval_secs: interval.as_secs_f64(),
            uncounted: AtomicU64::new(0),
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    /// EWMA equivalent to a UNIX load average over `minutes`
    pub fn over_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp();
        Self::new(alpha, TICK_INTERVAL)
    }

    /// Record `n` new events
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the uncounted events into the average
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / self.interval_secs;

        if self.initialized.swap(true, Ordering::AcqRel) {
            let current = f64::from_bits(self.rate.load(Ordering::Acquire));
            let updated = current + self.alpha * (instant_rate - current);
            self.rate.store(updated.to_bits(), Ordering::Release);
        } else {
            self.rate.store(instant_rate.to_bits(), Ordering::Release);
        }
    }

    /// Current rate in events per second
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire))
    }
}

// =============================================================================
// Meter
// =============================================================================

/// Event rate and total count
#[derive(Debug)]
pub struct Meter {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    count: AtomicU64,
    start: u64,
    last_tick: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Meter {
    /// Create a meter on the system clock
    pub fn new() -> Self {
        Self::with_clock(clock::system())
    }

    /// Create a meter on a specific clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start = clock.tick();
        Self {
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
            count: AtomicU64::new(0),
            start,
            last_tick: AtomicU64::new(start),
            clock,
        }
    }

    /// Record one event
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record `n` events
    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Total events recorded
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// One-minute rate, events per second
    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    /// Five-minute rate, events per second
    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    /// Fifteen-minute rate, events per second
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Mean rate since creation, events per second
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick().saturating_sub(self.start);
        if elapsed == 0 {
            return 0.0;
        }
        count as f64 / (elapsed as f64 / 1e9)
    }

    fn tick_if_necessary(&self) {
        let interval = TICK_INTERVAL.as_nanos() as u64;
        let old = self.last_tick.load(Ordering::Acquire);
        let now = self.clock.tick();
        let age = now.saturating_sub(old);
        if age <= interval {
            return;
        }

        let interval_start = now - age % interval;
        if self
            .last_tick
            .compare_exchange(old, interval_start, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            for _ in 0..age / interval {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}
