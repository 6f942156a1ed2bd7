//! Example workload: a batch job processor instrumented with metrics
//!
//! # Data Flow
//! ```text
//! JobSource ──fetch(batch)──▶ queue ──pop──▶ JobHandler
//!     │                         │               │
//!     ▼                         ▼               ▼
//! jobs.pending += batch   jobs.pending -= 1   ok:  jobs.completed.<customer>.<type>.mark()
//!                         (always)            err: jobs.failed.mark()
//! ```
//!
//! `jobs.pending` always equals the queue length plus the job in flight.

mod job;
mod processor;

pub use job::{Customer, Job, JobHandler, JobSource, JobType, RandomJobSource, SimulatedHandler};
pub use processor::{
    JobProcessor, StepOutcome, COMPLETED_PREFIX, FAILED_METRIC, PENDING_METRIC,
};
