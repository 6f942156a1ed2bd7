//! Metrics
//!
//! Metric variants and the registry that names them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          MetricRegistry                              │
//! │   "app.host.requests" ──▶ Gauge      (function, read fresh)          │
//! │   "jobs.pending"      ──▶ Counter    (atomic i64)                    │
//! │   "jobs.completed.*"  ──▶ Meter      (count + 1/5/15m EWMA)          │
//! │   "process.memory.*"  ◀── MetricSet  (flattened under a prefix)      │
//! └──────────────────────────────────────────────────────────────────────┘
//!                │ snapshot()
//!                ▼
//!            Reporters
//! ```
//!
//! Mutation (`inc`, `dec`, `mark`, `update`) is only available on the
//! concrete types; the [`Metric`] enum is what reporters read.

mod clock;
mod counter;
mod gauge;
mod histogram;
mod meter;
mod registry;
mod set;
mod timer;
mod unit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::Counter;
pub use gauge::{Gauge, GaugeValue};
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Ewma, Meter};
pub use registry::{name, Metric, MetricRegistry};
pub use set::{flatten, MetricGroup, MetricSet, MetricSetEntry};
pub use timer::{Timer, TimerContext};
pub use unit::TimeUnit;

pub(crate) use gauge::panic_message;
