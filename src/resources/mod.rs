//! Process resource gauges
//!
//! Registered as metric sets under fixed prefixes:
//!
//! ```text
//! process.memory.rss_bytes      resident set size
//! process.memory.virtual_bytes  virtual memory size
//! process.threads.count         OS threads in this process
//! process.uptime.seconds        seconds since the sets were created
//! process.fd                    open descriptors / descriptor limit
//! ```
//!
//! Values come from `/proc/self` on Linux. Elsewhere every read fails and
//! reporters leave the gauges out.

use std::time::Instant;

use anyhow::{anyhow, Context};

use crate::error::Result;
use crate::metrics::{Gauge, GaugeValue, Metric, MetricRegistry, MetricSet, MetricSetEntry};

/// Register every process gauge with `registry`
pub fn register_process_metrics(registry: &MetricRegistry) -> Result<()> {
    registry.register_all("process.memory", &MemoryUsageSet)?;
    registry.register_all("process.threads", &ThreadSet)?;
    registry.register_all("process.uptime", &UptimeSet::new())?;
    registry.register("process.fd", fd_ratio_gauge())?;
    Ok(())
}

fn gauge_entry<F>(read: F) -> MetricSetEntry
where
    F: Fn() -> anyhow::Result<GaugeValue> + Send + Sync + 'static,
{
    MetricSetEntry::Metric(Metric::from(Gauge::new(read)))
}

// =============================================================================
// Metric Sets
// =============================================================================

/// Resident and virtual memory of this process
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryUsageSet;

impl MetricSet for MemoryUsageSet {
    fn metrics(&self) -> Vec<(String, MetricSetEntry)> {
        vec![
            (
                "rss_bytes".to_string(),
                gauge_entry(|| status_field("VmRSS").map(|kb| GaugeValue::from(kb * 1024))),
            ),
            (
                "virtual_bytes".to_string(),
                gauge_entry(|| status_field("VmSize").map(|kb| GaugeValue::from(kb * 1024))),
            ),
        ]
    }
}

/// Thread count of this process
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSet;

impl MetricSet for ThreadSet {
    fn metrics(&self) -> Vec<(String, MetricSetEntry)> {
        vec![(
            "count".to_string(),
            gauge_entry(|| status_field("Threads").map(GaugeValue::from)),
        )]
    }
}

/// Seconds since creation
#[derive(Debug, Clone, Copy)]
pub struct UptimeSet {
    started: Instant,
}

impl UptimeSet {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for UptimeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSet for UptimeSet {
    fn metrics(&self) -> Vec<(String, MetricSetEntry)> {
        let started = self.started;
        vec![(
            "seconds".to_string(),
            gauge_entry(move || Ok(GaugeValue::from(started.elapsed().as_secs()))),
        )]
    }
}

/// Ratio of open file descriptors to the soft limit
pub fn fd_ratio_gauge() -> Gauge {
    Gauge::new(|| {
        let open = open_fds()?;
        let limit = fd_limit()?;
        if limit == 0 {
            return Err(anyhow!("file descriptor limit is zero"));
        }
        Ok(GaugeValue::Float(open as f64 / limit as f64))
    })
}

// =============================================================================
// procfs
// =============================================================================

#[cfg(target_os = "linux")]
fn read_proc(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path))
}

#[cfg(not(target_os = "linux"))]
fn read_proc(path: &str) -> anyhow::Result<String> {
    Err(anyhow!("{} is only available on Linux", path))
}

fn status_field(key: &str) -> anyhow::Result<u64> {
    let status = read_proc("/proc/self/status")?;
    parse_status_value(&status, key).ok_or_else(|| anyhow!("{} missing from /proc/self/status", key))
}

fn open_fds() -> anyhow::Result<u64> {
    #[cfg(target_os = "linux")]
    {
        let entries = std::fs::read_dir("/proc/self/fd").context("listing /proc/self/fd")?;
        Ok(entries.count() as u64)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(anyhow!("open descriptor count is only available on Linux"))
    }
}

fn fd_limit() -> anyhow::Result<u64> {
    let limits = read_proc("/proc/self/limits")?;
    parse_open_files_limit(&limits).ok_or_else(|| anyhow!("no numeric open files limit"))
}

/// First number after `<key>:` in a `/proc/<pid>/status` document
fn parse_status_value(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Soft limit from the "Max open files" row of `/proc/<pid>/limits`
fn parse_open_files_limit(limits: &str) -> Option<u64> {
    let line = limits.lines().find(|l| l.starts_with("Max open files"))?;
    let rest = line.trim_start_matches("Max open files");
    rest.split_whitespace().next()?.parse().ok()
}
