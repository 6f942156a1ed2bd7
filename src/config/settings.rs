//! Process settings
//!
//! Defaults, overlaid by an optional YAML file, overlaid by command-line
//! flags and environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Settings
// =============================================================================

/// Everything the binary needs to wire reporters, probes and the workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Host identity override; resolved from the system when absent
    #[serde(default)]
    pub host_name: Option<String>,

    /// Application identity override; `app` when absent
    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default)]
    pub statsd: StatsdSettings,

    #[serde(default)]
    pub console: ConsoleSettings,

    /// Seconds between reporter ticks
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Seconds between health polls
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    #[serde(default)]
    pub workload: WorkloadSettings,
}

/// StatsD collector endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsdSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_statsd_host")]
    pub host: String,

    #[serde(default = "default_statsd_port")]
    pub port: u16,

    /// Payload budget per UDP datagram
    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Simulated job processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Jobs fetched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound of simulated per-job latency
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Probability (0.0 - 1.0) that a simulated job fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host_name: None,
            app_name: None,
            statsd: StatsdSettings::default(),
            console: ConsoleSettings::default(),
            report_interval_secs: default_report_interval(),
            health_interval_secs: default_health_interval(),
            workload: WorkloadSettings::default(),
        }
    }
}

impl Default for StatsdSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_statsd_host(),
            port: default_statsd_port(),
            max_datagram_bytes: default_max_datagram_bytes(),
        }
    }
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            batch_size: default_batch_size(),
            max_latency_ms: default_max_latency_ms(),
            failure_rate: default_failure_rate(),
        }
    }
}

// =============================================================================
// Default Values
// =============================================================================

fn default_enabled() -> bool {
    true
}

fn default_report_interval() -> u64 {
    5
}

fn default_health_interval() -> u64 {
    1
}

fn default_statsd_host() -> String {
    "localhost".to_string()
}

fn default_statsd_port() -> u16 {
    8125
}

fn default_max_datagram_bytes() -> usize {
    crate::reporting::DEFAULT_MAX_DATAGRAM_BYTES
}

fn default_batch_size() -> usize {
    50
}

fn default_max_latency_ms() -> u64 {
    25
}

fn default_failure_rate() -> f64 {
    0.05
}

// =============================================================================
// Loading
// =============================================================================

/// Values supplied on the command line or through the environment
///
/// `None` leaves the file or default value in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host_name: Option<String>,
    pub app_name: Option<String>,
    pub statsd_host: Option<String>,
    pub statsd_port: Option<u16>,
    pub report_interval_secs: Option<u64>,
}

impl Settings {
    /// Parse settings from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    /// Layer command-line values on top
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if overrides.host_name.is_some() {
            self.host_name = overrides.host_name;
        }
        if overrides.app_name.is_some() {
            self.app_name = overrides.app_name;
        }
        if let Some(host) = overrides.statsd_host {
            self.statsd.host = host;
        }
        if let Some(port) = overrides.statsd_port {
            self.statsd.port = port;
        }
        if let Some(secs) = overrides.report_interval_secs {
            self.report_interval_secs = secs;
        }
        self
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.report_interval_secs == 0 {
            return Err(Error::Config("report_interval_secs must be > 0".to_string()));
        }
        if self.health_interval_secs == 0 {
            return Err(Error::Config("health_interval_secs must be > 0".to_string()));
        }
        if self.workload.batch_size == 0 {
            return Err(Error::Config("workload.batch_size must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.workload.failure_rate) {
            return Err(Error::Config(format!(
                "workload.failure_rate must be within 0.0 - 1.0, got {}",
                self.workload.failure_rate
            )));
        }
        if self.statsd.enabled && self.statsd.host.trim().is_empty() {
            return Err(Error::Config("statsd.host must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.statsd.host, "localhost");
        assert_eq!(settings.statsd.port, 8125);
        assert_eq!(settings.report_interval(), Duration::from_secs(5));
        assert_eq!(settings.health_interval(), Duration::from_secs(1));
        assert_eq!(settings.workload.batch_size, 50);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml(
            r#"
app_name: billing
statsd:
  port: 9125
workload:
  failure_rate: 0.0
"#,
        )
        .unwrap();

        assert_eq!(settings.app_name.as_deref(), Some("billing"));
        assert_eq!(settings.host_name, None);
        assert_eq!(settings.statsd.port, 9125);
        assert_eq!(settings.statsd.host, "localhost");
        assert_eq!(settings.workload.failure_rate, 0.0);
        assert_eq!(settings.workload.batch_size, 50);
        assert!(settings.console.enabled);
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::from_yaml("app_name: billing\nhost_name: from-file\n")
            .unwrap()
            .apply(Overrides {
                host_name: Some("from-cli".to_string()),
                statsd_port: Some(1),
                ..Default::default()
            });

        assert_eq!(settings.host_name.as_deref(), Some("from-cli"));
        assert_eq!(settings.app_name.as_deref(), Some("billing"));
        assert_eq!(settings.statsd.port, 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.report_interval_secs = 0;
        assert_matches!(settings.validate(), Err(Error::Config(_)));

        let mut settings = Settings::default();
        settings.workload.failure_rate = 1.5;
        assert_matches!(settings.validate(), Err(Error::Config(_)));

        let mut settings = Settings::default();
        settings.workload.batch_size = 0;
        assert_matches!(settings.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        assert_matches!(Settings::from_yaml("statsd: [1, 2"), Err(Error::Yaml(_)));
    }
}
