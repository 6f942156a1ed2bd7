//! Reporting
//!
//! Reporters drain the registry on their own schedule.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │  MetricRegistry  │
//!                 └────────┬─────────┘
//!            snapshot()    │    snapshot()
//!          ┌───────────────┴───────────────┐
//!          ▼                               ▼
//! ┌──────────────────┐            ┌──────────────────┐
//! │ ScheduledReporter│            │ ScheduledReporter│
//! │  (own interval)  │            │  (own interval)  │
//! │  filter → Report │            │  filter → Report │
//! └────────┬─────────┘            └────────┬─────────┘
//!          ▼                               ▼
//!   ConsoleReporter                 StatsdReporter
//!   (text → stdout)                 (lines → UDP)
//! ```
//!
//! A failed tick is logged and dropped; the schedule carries on.

mod console;
mod reading;
mod statsd;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::{Metric, MetricRegistry, TimeUnit};

pub use console::ConsoleReporter;
pub use reading::{Distribution, MeterReading, Reading, Report};
pub use statsd::{DatagramTransport, StatsdReporter, UdpTransport, DEFAULT_MAX_DATAGRAM_BYTES};

// =============================================================================
// Filter
// =============================================================================

type FilterFn = dyn Fn(&str, &Metric) -> bool + Send + Sync;

/// Predicate selecting which metrics a reporter emits
#[derive(Clone)]
pub struct MetricFilter(Arc<FilterFn>);

impl MetricFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &Metric) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Accept everything
    pub fn all() -> Self {
        Self::new(|_, _| true)
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |name, _| name.starts_with(&prefix))
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(move |name, _| name.contains(&needle))
    }

    pub fn matches(&self, name: &str, metric: &Metric) -> bool {
        (self.0)(name, metric)
    }
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for MetricFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetricFilter(..)")
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Options shared by every reporter
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Unit rates are converted to
    pub rate_unit: TimeUnit,
    /// Unit durations are converted to
    pub duration_unit: TimeUnit,
    /// Which metrics to emit
    pub filter: MetricFilter,
}

impl ReporterConfig {
    pub fn convert_rates_to(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn convert_durations_to(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    pub fn filter(mut self, filter: MetricFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            filter: MetricFilter::all(),
        }
    }
}

// =============================================================================
// Reporter
// =============================================================================

/// Formats a report and writes it to a sink
#[async_trait]
pub trait Reporter: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Emit one report
    async fn report(&self, report: &Report) -> Result<()>;
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs a [`Reporter`] against a registry on its own timer
pub struct ScheduledReporter {
    registry: Arc<MetricRegistry>,
    config: ReporterConfig,
    reporter: Arc<dyn Reporter>,
    running: Mutex<Option<Running>>,
}

impl ScheduledReporter {
    pub fn new(
        registry: Arc<MetricRegistry>,
        config: ReporterConfig,
        reporter: impl Reporter,
    ) -> Self {
        Self {
            registry,
            config,
            reporter: Arc::new(reporter),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Report once, right now
    pub async fn report_now(&self) -> Result<()> {
        tick(&self.registry, &self.config, self.reporter.as_ref()).await
    }

    /// Start reporting every `period`; the first report is one period out
    ///
    /// Restarting replaces the previous schedule. Must be called from within a
    /// tokio runtime. A zero period is rejected and leaves any current
    /// schedule in place.
    pub fn start(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(Error::Config(format!(
                "{} reporter period must be greater than zero",
                self.reporter.name()
            )));
        }

        let mut running = self.running.lock();
        if let Some(previous) = running.take() {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        let reporter = Arc::clone(&self.reporter);
        let task_token = token.clone();

        info!(
            reporter = reporter.name(),
            period_ms = period.as_millis() as u64,
            "Starting reporter"
        );

        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!(reporter = reporter.name(), "Reporter stopped");
                        break;
                    }
                    _ = ticks.tick() => {
                        if let Err(e) = tick(&registry, &config, reporter.as_ref()).await {
                            warn!(reporter = reporter.name(), error = %e, "Report failed, will retry next tick");
                        }
                    }
                }
            }
        });

        *running = Some(Running { token, handle });
        Ok(())
    }

    /// Cancel future ticks; other reporters are unaffected
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.token.cancel();
        }
    }

    /// Cancel and wait for an in-flight tick to finish
    pub async fn shutdown(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.token.cancel();
            if let Err(e) = running.handle.await {
                warn!(reporter = self.reporter.name(), error = %e, "Reporter task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ScheduledReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick(registry: &MetricRegistry, config: &ReporterConfig, reporter: &dyn Reporter) -> Result<()> {
    let report = Report::collect(&registry.snapshot(), config);
    reporter.report(&report).await
}

// =============================================================================
// Tests
// =============================================================================
