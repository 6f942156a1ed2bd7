//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! HealthCheckRegistry (registry.rs)
//!     name → probe
//!
//! HealthPoller (poller.rs)
//!     Periodic timer
//!     → run_all(): every probe once, each inside its own fault boundary
//!     → print "<name> is healthy" / "<name> is UNHEALTHY: <message>"
//! ```
//!
//! A probe that returns an error or panics is reported unhealthy with the
//! fault attached; the remaining probes still run.

mod check;
mod poller;
mod registry;

pub use check::{execute, HealthCheck, HealthCheckResult};
pub use poller::{HealthPoller, DEFAULT_PERIOD};
pub use registry::HealthCheckRegistry;
