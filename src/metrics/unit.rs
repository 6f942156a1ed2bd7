//! Time units used for rate and duration conversion

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Granularity used when converting rates and durations for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds
    pub fn nanos(&self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Length of one unit in (fractional) seconds
    pub fn seconds(&self) -> f64 {
        self.nanos() as f64 / 1e9
    }

    /// Convert a per-second rate into a per-unit rate
    pub fn convert_rate(&self, per_second: f64) -> f64 {
        per_second * self.seconds()
    }

    /// Convert a duration in nanoseconds into this unit
    pub fn convert_duration(&self, nanos: f64) -> f64 {
        nanos / self.nanos() as f64
    }

    /// Build a [`Duration`] of `amount` units
    pub fn duration(&self, amount: u64) -> Duration {
        Duration::from_nanos(amount.saturating_mul(self.nanos()))
    }

    /// Singular lowercase name, as used in "events/second"
    pub fn singular(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanosecond",
            TimeUnit::Microseconds => "microsecond",
            TimeUnit::Milliseconds => "millisecond",
            TimeUnit::Seconds => "second",
            TimeUnit::Minutes => "minute",
            TimeUnit::Hours => "hour",
            TimeUnit::Days => "day",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Nanoseconds => write!(f, "nanoseconds"),
            TimeUnit::Microseconds => write!(f, "microseconds"),
            TimeUnit::Milliseconds => write!(f, "milliseconds"),
            TimeUnit::Seconds => write!(f, "seconds"),
            TimeUnit::Minutes => write!(f, "minutes"),
            TimeUnit::Hours => write!(f, "hours"),
            TimeUnit::Days => write!(f, "days"),
        }
    }
}
