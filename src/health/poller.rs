//! Periodic health polling
//!
//! Runs every registered probe on a fixed period and prints one line per
//! probe: `"<name> is healthy"` to the out-writer, or
//! `"<name> is UNHEALTHY: <message>"` plus the fault detail to the err-writer.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use super::check::HealthCheckResult;
use super::registry::HealthCheckRegistry;
use crate::error::{Error, Result};
use crate::output::{self, SharedWriter};

/// Default polling period
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Prints health check results on a timer
pub struct HealthPoller {
    registry: Arc<HealthCheckRegistry>,
    period: Duration,
    out: SharedWriter,
    err: SharedWriter,
}

impl std::fmt::Debug for HealthPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthPoller")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl HealthPoller {
    /// Poll `registry` every `period`, printing to stdout/stderr
    pub fn new(registry: Arc<HealthCheckRegistry>, period: Duration) -> Result<Self> {
        Self::with_writers(registry, period, output::stdout(), output::stderr())
    }

    /// Fails with [`Error::Config`] if `period` is zero
    pub fn with_writers(
        registry: Arc<HealthCheckRegistry>,
        period: Duration,
        out: SharedWriter,
        err: SharedWriter,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::Config(
                "health poll period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            registry,
            period,
            out,
            err,
        })
    }

    /// Run all probes once and print their classification
    pub fn poll_once(&self) -> BTreeMap<String, HealthCheckResult> {
        let results = self.registry.run_all();
        if let Err(e) = self.print(&results) {
            error!(error = %e, "Failed to print health check results");
        }
        results
    }

    fn print(&self, results: &BTreeMap<String, HealthCheckResult>) -> io::Result<()> {
        for (name, result) in results {
            if result.healthy {
                writeln!(self.out.lock(), "{} is healthy", name)?;
            } else {
                let mut err = self.err.lock();
                writeln!(
                    err,
                    "{} is UNHEALTHY: {}",
                    name,
                    result.message.as_deref().unwrap_or("")
                )?;
                if let Some(fault) = &result.error {
                    writeln!(err, "{:?}", fault)?;
                }
            }
        }
        self.out.lock().flush()?;
        self.err.lock().flush()
    }

    /// Poll until `token` is cancelled
    ///
    /// Probes are synchronous user code, so each round runs on the blocking
    /// pool to keep timers on the runtime responsive.
    #[instrument(skip(self, token))]
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(period_ms = self.period.as_millis() as u64, "Starting health poller");

        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately; wait a full period like the reporters
        tick.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Health poller shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let poller = Arc::clone(&self);
                    if let Err(e) = tokio::task::spawn_blocking(move || poller.poll_once()).await {
                        error!(error = %e, "Health poll task failed");
                    }
                }
            }
        }
    }
}
