//! Metrics Facade - named metrics, scheduled reporters and health checks
//!
//! An application registers named measurements in a [`MetricRegistry`],
//! reporters drain it on their own timers (console text, StatsD over UDP),
//! and a [`HealthCheckRegistry`] runs named probes with every fault contained
//! to the probe that raised it.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                          MetricsConfig                             │
//! │        app.host prefix  ·  MetricRegistry  ·  HealthCheckRegistry  │
//! └──────┬──────────────────────────┬──────────────────────┬──────────┘
//!        │ register / inc / mark    │ snapshot()           │ run_all()
//! ┌──────┴───────┐        ┌─────────┴──────────┐   ┌───────┴────────┐
//! │ JobProcessor │        │ ScheduledReporter  │   │  HealthPoller  │
//! │ process.*    │        │ console · statsd   │   │  (1s period)   │
//! └──────────────┘        └────────────────────┘   └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`metrics`] - Metric variants, metric sets and the registry
//! - [`health`] - Health checks, their registry and the poller
//! - [`reporting`] - Scheduled console and StatsD reporters
//! - [`config`] - Identity resolution and process settings
//! - [`resources`] - Process resource gauges
//! - [`workload`] - Example batch job processor
//! - [`demo`] - Random gauge and health check used by the binary
//! - [`error`] - Error types

pub mod config;
pub mod demo;
pub mod error;
pub mod health;
pub mod metrics;
pub mod output;
pub mod reporting;
pub mod resources;
pub mod workload;

// Re-export commonly used types
pub use config::{MetricsConfig, Settings};
pub use error::{Error, Result};
pub use health::{HealthCheck, HealthCheckRegistry, HealthCheckResult, HealthPoller};
pub use metrics::{Counter, Gauge, Meter, Metric, MetricRegistry, MetricSet, TimeUnit};
pub use reporting::{
    ConsoleReporter, MetricFilter, Reporter, ReporterConfig, ScheduledReporter, StatsdReporter,
};
