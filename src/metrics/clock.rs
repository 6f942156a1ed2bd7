//! Monotonic time sources for rate calculations

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanosecond tick source
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current tick in nanoseconds; only differences are meaningful
    fn tick(&self) -> u64;
}

/// Clock backed by [`Instant`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        PROCESS_START.elapsed().as_nanos() as u64
    }
}

/// Shared default clock
pub fn system() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
