//! Metrics configuration
//!
//! [`MetricsConfig`] owns one metric registry and one health-check registry,
//! tagged with the host and application identity used as the reporting
//! prefix (`<app>.<host>`).
//!
//! # Identity Resolution
//!
//! ```text
//! Unresolved ──first read──▶ explicit override? ──yes──▶ Resolved
//!                                   │ no
//!                                   ▼
//!                           system lookup (host only)
//!                              │ ok         │ fault / empty
//!                              ▼            ▼
//!                          Resolved     literal fallback ──▶ Resolved
//! ```
//!
//! Once resolved, a value never changes for the life of the config.

mod settings;

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::health::HealthCheckRegistry;
use crate::metrics::MetricRegistry;

pub use settings::{ConsoleSettings, Overrides, Settings, StatsdSettings, WorkloadSettings};

/// Host name used when no override is given and the lookup fails
pub const DEFAULT_HOST_NAME: &str = "host";

/// Application name used when no override is given
pub const DEFAULT_APP_NAME: &str = "app";

// =============================================================================
// Host Lookup
// =============================================================================

/// Source of the machine's network host name
pub trait HostResolver: Send + Sync {
    fn resolve(&self) -> Result<String>;
}

impl<F> HostResolver for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn resolve(&self) -> Result<String> {
        self()
    }
}

/// Reads the host name from the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHostResolver;

impl HostResolver for SystemHostResolver {
    #[cfg(unix)]
    fn resolve(&self) -> Result<String> {
        let mut buf = [0u8; 256];
        // SAFETY: buf is writable for buf.len() bytes and outlives the call
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return Err(Error::Resolution(std::io::Error::last_os_error().to_string()));
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    #[cfg(not(unix))]
    fn resolve(&self) -> Result<String> {
        std::env::var("COMPUTERNAME")
            .map_err(|e| Error::Resolution(format!("COMPUTERNAME: {}", e)))
    }
}

// =============================================================================
// Identity
// =============================================================================

/// A name resolved at most once
pub struct Identity {
    label: &'static str,
    explicit: Option<String>,
    lookup: Option<Arc<dyn HostResolver>>,
    fallback: &'static str,
    resolved: OnceCell<String>,
}

impl Identity {
    fn new(
        label: &'static str,
        explicit: Option<String>,
        lookup: Option<Arc<dyn HostResolver>>,
        fallback: &'static str,
    ) -> Self {
        Self {
            label,
            explicit: explicit.filter(|v| !v.trim().is_empty()),
            lookup,
            fallback,
            resolved: OnceCell::new(),
        }
    }

    /// Resolved value; resolves on first call
    pub fn get(&self) -> &str {
        self.resolved.get_or_init(|| self.resolve())
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn resolve(&self) -> String {
        if let Some(value) = &self.explicit {
            debug!(identity = self.label, value = %value, "Using explicit identity");
            return value.clone();
        }

        if let Some(lookup) = &self.lookup {
            match lookup.resolve() {
                Ok(value) if !value.trim().is_empty() => {
                    debug!(identity = self.label, value = %value, "Resolved identity from system");
                    return value.trim().to_string();
                }
                Ok(_) => {
                    warn!(identity = self.label, fallback = self.fallback, "System returned an empty name")
                }
                Err(e) => {
                    warn!(identity = self.label, fallback = self.fallback, error = %e, "Identity lookup failed")
                }
            }
        }

        self.fallback.to_string()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("label", &self.label)
            .field("resolved", &self.resolved.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// MetricsConfig
// =============================================================================

/// Registries plus the identity that prefixes every reported name
#[derive(Debug)]
pub struct MetricsConfig {
    host_name: Identity,
    app_name: Identity,
    registry: Arc<MetricRegistry>,
    health_checks: Arc<HealthCheckRegistry>,
}

impl MetricsConfig {
    pub fn builder() -> MetricsConfigBuilder {
        MetricsConfigBuilder::default()
    }

    /// Config with explicit names and fresh registries
    pub fn new(host_name: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self::builder().host_name(host_name).app_name(app_name).build()
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn health_checks(&self) -> &Arc<HealthCheckRegistry> {
        &self.health_checks
    }

    pub fn host_name(&self) -> &str {
        self.host_name.get()
    }

    pub fn app_name(&self) -> &str {
        self.app_name.get()
    }

    /// Identity state, for inspection
    pub fn host_identity(&self) -> &Identity {
        &self.host_name
    }

    pub fn app_identity(&self) -> &Identity {
        &self.app_name
    }

    /// Reporting prefix: `<app>.<host>`
    pub fn prefix(&self) -> String {
        format!("{}.{}", self.app_name(), self.host_name())
    }
}

/// Builder for [`MetricsConfig`]
#[derive(Default)]
pub struct MetricsConfigBuilder {
    host_name: Option<String>,
    app_name: Option<String>,
    resolver: Option<Arc<dyn HostResolver>>,
    registry: Option<Arc<MetricRegistry>>,
    health_checks: Option<Arc<HealthCheckRegistry>>,
}

impl MetricsConfigBuilder {
    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = Some(name.into());
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set both overrides from optional values
    pub fn names(mut self, host_name: Option<String>, app_name: Option<String>) -> Self {
        self.host_name = host_name;
        self.app_name = app_name;
        self
    }

    /// Replace the system host lookup
    pub fn resolver(mut self, resolver: impl HostResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Share an existing metric registry
    pub fn registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing health-check registry
    pub fn health_checks(mut self, health_checks: Arc<HealthCheckRegistry>) -> Self {
        self.health_checks = Some(health_checks);
        self
    }

    pub fn build(self) -> MetricsConfig {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SystemHostResolver));

        MetricsConfig {
            host_name: Identity::new("host_name", self.host_name, Some(resolver), DEFAULT_HOST_NAME),
            app_name: Identity::new("app_name", self.app_name, None, DEFAULT_APP_NAME),
            registry: self.registry.unwrap_or_default(),
            health_checks: self.health_checks.unwrap_or_default(),
        }
    }
}
