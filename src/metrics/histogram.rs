//! Histogram metric
//!
//! Statistical distribution over the most recent samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Default number of samples kept by the sliding window
pub const DEFAULT_WINDOW: usize = 1028;

/// Distribution of the most recent `window` values
#[derive(Debug)]
pub struct Histogram {
    window: usize,
    samples: Mutex<VecDeque<i64>>,
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the default window
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create with a custom window size
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: Mutex::new(VecDeque::with_capacity(window)),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut samples = self.samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    /// Number of values ever recorded
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Point-in-time statistics over the window
    pub fn snapshot(&self) -> HistogramSnapshot {
        let values: Vec<i64> = self.samples.lock().iter().copied().collect();
        HistogramSnapshot::from_values(values)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted copy of the window with derived statistics
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    values: Vec<i64>,
}

impl HistogramSnapshot {
    pub fn from_values(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self
            .values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum();
        (sum_sq / (n - 1) as f64).sqrt()
    }

    /// Interpolated value at `quantile` (0.0 - 1.0)
    pub fn value(&self, quantile: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let quantile = quantile.clamp(0.0, 1.0);
        let pos = quantile * (n + 1) as f64;
        let index = pos as usize;

        if index < 1 {
            return self.values[0] as f64;
        }
        if index >= n {
            return self.values[n - 1] as f64;
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }
}
