//! Health Check Registry

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::check::{self, HealthCheck, HealthCheckResult};
use crate::error::{Error, Result};

/// Named probes, run on demand
#[derive(Default)]
pub struct HealthCheckRegistry {
    checks: RwLock<BTreeMap<String, Arc<dyn HealthCheck>>>,
}

impl HealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe; fails with [`Error::DuplicateName`] on collision
    pub fn register(
        &self,
        name: impl Into<String>,
        check: impl HealthCheck + 'static,
    ) -> Result<()> {
        let name = name.into();
        let mut checks = self.checks.write();
        if checks.contains_key(&name) {
            return Err(Error::DuplicateName { name });
        }
        debug!(name = %name, "Registered health check");
        checks.insert(name, Arc::new(check));
        Ok(())
    }

    /// Remove a probe, returning whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        self.checks.write().remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.checks.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().is_empty()
    }

    /// Run a single probe
    pub fn run(&self, name: &str) -> Result<HealthCheckResult> {
        let check = self
            .checks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        Ok(check::execute(check.as_ref()))
    }

    /// Run every probe exactly once
    ///
    /// Probes run outside the registry lock; a faulting probe yields an
    /// unhealthy result and the rest still run.
    pub fn run_all(&self) -> BTreeMap<String, HealthCheckResult> {
        let checks: Vec<_> = self
            .checks
            .read()
            .iter()
            .map(|(name, check)| (name.clone(), Arc::clone(check)))
            .collect();

        checks
            .into_iter()
            .map(|(name, check)| {
                let result = check::execute(check.as_ref());
                if let Some(error) = &result.error {
                    warn!(check = %name, error = %error, "Health check raised a fault");
                }
                (name, result)
            })
            .collect()
    }

    /// True when every result is healthy
    pub fn is_all_healthy(results: &BTreeMap<String, HealthCheckResult>) -> bool {
        results.values().all(HealthCheckResult::is_healthy)
    }
}

impl std::fmt::Debug for HealthCheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckRegistry")
            .field("checks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn healthy() -> anyhow::Result<HealthCheckResult> {
        Ok(HealthCheckResult::healthy())
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = HealthCheckRegistry::new();
        registry.register("database", healthy).unwrap();

        assert_matches!(
            registry.register("database", healthy),
            Err(Error::DuplicateName { name }) if name == "database"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_run_all_isolates_faults() {
        let registry = HealthCheckRegistry::new();
        registry.register("a", healthy).unwrap();
        registry
            .register("b", || -> anyhow::Result<HealthCheckResult> {
                anyhow::bail!("disk full")
            })
            .unwrap();
        registry
            .register("c", || -> anyhow::Result<HealthCheckResult> {
                Ok(HealthCheckResult::unhealthy("degraded"))
            })
            .unwrap();

        let results = registry.run_all();
        assert_eq!(results.len(), 3);
        assert!(results["a"].healthy);
        assert!(!results["b"].healthy);
        assert!(results["b"].error.is_some());
        assert!(!results["c"].healthy);
        assert!(results["c"].error.is_none());
        assert!(!HealthCheckRegistry::is_all_healthy(&results));
    }

    #[test]
    fn test_run_single() {
        let registry = HealthCheckRegistry::new();
        registry.register("a", healthy).unwrap();

        assert!(registry.run("a").unwrap().healthy);
        assert_matches!(registry.run("b"), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_unregister() {
        let registry = HealthCheckRegistry::new();
        registry.register("a", healthy).unwrap();
        assert!(registry.unregister("a"));
        assert!(registry.run_all().is_empty());
    }
}
