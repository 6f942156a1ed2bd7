//! Error types for the metrics facade

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering, reading or reporting metrics
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    // =========================================================================
    // Registration Errors
    // =========================================================================
    /// A metric or health check is already registered under this name
    #[error("A metric named {name} already exists")]
    DuplicateName { name: String },

    /// A metric set contains itself, directly or transitively
    #[error("Metric set at {path} contains itself")]
    CyclicMetricSet { path: String },

    /// No metric or health check is registered under this name
    #[error("No metric named {name}")]
    NotFound { name: String },

    /// The name is registered, but to a different metric variant
    #[error("{name} is already registered as a {actual}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Malformed metric name
    #[error("Invalid metric name: {0:?}")]
    InvalidName(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// A gauge function failed or panicked while being read
    #[error("Gauge read failed: {0}")]
    GaugeRead(String),

    /// Reporter failed to deliver a batch to its sink
    #[error("Sink write failed: {0}")]
    Sink(String),

    /// Host identity lookup failed
    #[error("Host name resolution failed: {0}")]
    Resolution(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML settings could not be parsed
    #[error("Failed to parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::DuplicateName {
            name: "jobs.pending".to_string(),
        };
        assert_eq!(err.to_string(), "A metric named jobs.pending already exists");

        let err = Error::TypeMismatch {
            name: "requests".to_string(),
            expected: "counter",
            actual: "gauge",
        };
        assert_eq!(
            err.to_string(),
            "requests is already registered as a gauge, not a counter"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
