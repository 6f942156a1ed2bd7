//! Health Checks
//!
//! Probe trait and the result each probe yields.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::panic_message;

/// Health check result
#[derive(Clone)]
pub struct HealthCheckResult {
    /// Whether the probe passed
    pub healthy: bool,
    /// Message
    pub message: Option<String>,
    /// Fault raised by the probe, if any
    pub error: Option<Arc<anyhow::Error>>,
    /// Duration of check
    pub duration: Duration,
}

impl HealthCheckResult {
    /// Create a healthy result
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a healthy result with a message
    pub fn healthy_with(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::healthy()
        }
    }

    /// Create an unhealthy result
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Create an unhealthy result carrying the fault
    pub fn from_error(error: anyhow::Error) -> Self {
        Self {
            healthy: false,
            message: Some(format!("{:#}", error)),
            error: Some(Arc::new(error)),
            duration: Duration::ZERO,
        }
    }

    /// Set duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}

impl fmt::Debug for HealthCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckResult")
            .field("healthy", &self.healthy)
            .field("message", &self.message)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .field("duration", &self.duration)
            .finish()
    }
}

/// A named probe
///
/// Returning `Err` (or panicking) marks the probe unhealthy with the fault
/// attached; it never affects other probes.
pub trait HealthCheck: Send + Sync {
    fn check(&self) -> anyhow::Result<HealthCheckResult>;
}

impl<F> HealthCheck for F
where
    F: Fn() -> anyhow::Result<HealthCheckResult> + Send + Sync,
{
    fn check(&self) -> anyhow::Result<HealthCheckResult> {
        self()
    }
}

/// Run a probe inside a fault boundary and time it
pub fn execute(check: &dyn HealthCheck) -> HealthCheckResult {
    let started = Instant::now();
    let result = match catch_unwind(AssertUnwindSafe(|| check.check())) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => HealthCheckResult::from_error(e),
        Err(panic) => HealthCheckResult::from_error(anyhow::anyhow!(
            "health check panicked: {}",
            panic_message(panic.as_ref())
        )),
    };
    result.with_duration(started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_result() {
        let healthy = HealthCheckResult::healthy();
        assert!(healthy.is_healthy());
        assert!(healthy.message.is_none());

        let healthy = HealthCheckResult::healthy_with("3 replicas");
        assert!(healthy.is_healthy());
        assert_eq!(healthy.message.as_deref(), Some("3 replicas"));

        let unhealthy = HealthCheckResult::unhealthy("failed");
        assert!(!unhealthy.is_healthy());
        assert!(unhealthy.error.is_none());
    }

    #[test]
    fn test_execute_error() {
        let probe = || -> anyhow::Result<HealthCheckResult> {
            Err(anyhow::anyhow!("connection refused")).map_err(|e| e.context("database"))
        };
        let result = execute(&probe);

        assert!(!result.healthy);
        assert!(result.error.is_some());
        assert_eq!(result.message.as_deref(), Some("database: connection refused"));
    }

    #[test]
    fn test_execute_panic() {
        let probe = || -> anyhow::Result<HealthCheckResult> { panic!("probe exploded") };
        let result = execute(&probe);

        assert!(!result.healthy);
        assert!(result.message.unwrap().contains("probe exploded"));
    }

    #[test]
    fn test_execute_records_duration() {
        let probe = || -> anyhow::Result<HealthCheckResult> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(HealthCheckResult::healthy())
        };
        let result = execute(&probe);
        assert!(result.duration >= Duration::from_millis(5));
    }
}
