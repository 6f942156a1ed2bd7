//! Human-readable console reporter

use std::fmt::Write as _;
use std::io::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use super::{Distribution, MeterReading, Reading, Report, Reporter};
use crate::error::{Error, Result};
use crate::metrics::TimeUnit;
use crate::output::{self, SharedWriter};

const CONSOLE_WIDTH: usize = 80;

type NowFn = dyn Fn() -> DateTime<Local> + Send + Sync;

/// Writes each report as a dated block of text
pub struct ConsoleReporter {
    out: SharedWriter,
    now: Box<NowFn>,
}

impl ConsoleReporter {
    /// Report to standard output
    pub fn new() -> Self {
        Self::with_writer(output::stdout())
    }

    pub fn with_writer(out: SharedWriter) -> Self {
        Self {
            out,
            now: Box::new(Local::now),
        }
    }

    /// Replace the clock used for the header line
    pub fn with_now<F>(mut self, now: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + Sync + 'static,
    {
        self.now = Box::new(now);
        self
    }

    /// Render `report` as it would be printed at `now`
    pub fn format(report: &Report, now: DateTime<Local>) -> String {
        let mut text = String::new();

        let stamp = format!("{} ", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(text, "{}", banner(&stamp, '='));
        text.push('\n');

        let sections: [(&str, fn(&Reading) -> bool); 5] = [
            ("Gauges", |r| matches!(r, Reading::Gauge { .. })),
            ("Counters", |r| matches!(r, Reading::Counter { .. })),
            ("Histograms", |r| matches!(r, Reading::Histogram(_))),
            ("Meters", |r| matches!(r, Reading::Meter(_))),
            ("Timers", |r| matches!(r, Reading::Timer { .. })),
        ];

        for (title, belongs) in sections {
            let mut entries = report.entries.iter().filter(|(_, r)| belongs(r)).peekable();
            if entries.peek().is_none() {
                continue;
            }

            let _ = writeln!(text, "{}", banner(&format!("-- {} ", title), '-'));
            for (name, reading) in entries {
                let _ = writeln!(text, "{}", name);
                write_reading(&mut text, reading, report.rate_unit, report.duration_unit);
                text.push('\n');
            }
            text.push('\n');
        }

        text
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn report(&self, report: &Report) -> Result<()> {
        let text = Self::format(report, (self.now)());
        let mut out = self.out.lock();
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| Error::Sink(format!("console: {}", e)))
    }
}

fn banner(lead: &str, fill: char) -> String {
    let mut line = lead.to_string();
    while line.chars().count() < CONSOLE_WIDTH {
        line.push(fill);
    }
    line
}

fn write_reading(text: &mut String, reading: &Reading, rate_unit: TimeUnit, duration_unit: TimeUnit) {
    match reading {
        Reading::Gauge { value } => field(text, "value", value),
        Reading::Counter { count } => field(text, "count", count),
        Reading::Meter(meter) => write_meter(text, meter, rate_unit),
        Reading::Histogram(distribution) => {
            field(text, "count", distribution.count);
            write_distribution(text, distribution, "");
        }
        Reading::Timer { rates, durations } => {
            write_meter(text, rates, rate_unit);
            let suffix = format!(" {}", duration_unit);
            write_distribution(text, durations, &suffix);
        }
    }
}

fn write_meter(text: &mut String, meter: &MeterReading, rate_unit: TimeUnit) {
    let unit = format!("events/{}", rate_unit.singular());
    field(text, "count", meter.count);
    field(text, "mean rate", format!("{:.2} {}", meter.mean_rate, unit));
    field(text, "1-minute rate", format!("{:.2} {}", meter.m1_rate, unit));
    field(text, "5-minute rate", format!("{:.2} {}", meter.m5_rate, unit));
    field(text, "15-minute rate", format!("{:.2} {}", meter.m15_rate, unit));
}

fn write_distribution(text: &mut String, d: &Distribution, suffix: &str) {
    let rows = [
        ("min", d.min),
        ("max", d.max),
        ("mean", d.mean),
        ("stddev", d.std_dev),
        ("median", d.median),
        ("75%", d.p75),
        ("95%", d.p95),
        ("98%", d.p98),
        ("99%", d.p99),
        ("99.9%", d.p999),
    ];
    for (label, value) in rows {
        field(text, label, format!("{:.2}{}", value, suffix));
    }
}

fn field(text: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(text, "{:>20} = {}", label, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ManualClock, Meter, MetricRegistry};
    use crate::output::SharedBuffer;
    use crate::reporting::ReporterConfig;
    use chrono::TimeZone;
    use std::time::Duration;

    fn fixed_now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
            .single()
            .unwrap()
    }

    fn sample_registry() -> MetricRegistry {
        let registry = MetricRegistry::new();
        registry.counter("jobs.pending").unwrap().inc_by(7);
        registry.gauge("requests", || 42).unwrap();

        let clock = ManualClock::new();
        let meter = Meter::with_clock(clock.clone());
        meter.mark_n(10);
        clock.advance(Duration::from_secs(10));
        registry.register("jobs.failed", meter).unwrap();
        registry
    }

    #[test]
    fn test_format_sections() {
        let registry = sample_registry();
        let report = Report::collect(&registry.snapshot(), &ReporterConfig::default());
        let text = ConsoleReporter::format(&report, fixed_now());

        let header = text.lines().next().unwrap();
        assert!(header.starts_with("2024-03-01 12:30:00 ="));
        assert_eq!(header.len(), CONSOLE_WIDTH);

        assert!(text.contains("-- Gauges --"));
        assert!(text.contains("-- Counters --"));
        assert!(text.contains("-- Meters --"));
        assert!(!text.contains("-- Timers --"));

        assert!(text.contains("               count = 7"));
        assert!(text.contains("               value = 42"));
        assert!(text.contains("mean rate = 1.00 events/second"));

        let gauges = text.find("-- Gauges").unwrap();
        let counters = text.find("-- Counters").unwrap();
        let meters = text.find("-- Meters").unwrap();
        assert!(gauges < counters && counters < meters);
    }

    #[test]
    fn test_format_is_stable() {
        let registry = sample_registry();
        let report = Report::collect(&registry.snapshot(), &ReporterConfig::default());
        assert_eq!(
            ConsoleReporter::format(&report, fixed_now()),
            ConsoleReporter::format(&report, fixed_now())
        );
    }

    #[test]
    fn test_timer_units() {
        let registry = MetricRegistry::new();
        registry
            .timer("jobs.latency")
            .unwrap()
            .update(Duration::from_millis(250));

        let config = ReporterConfig::default().convert_rates_to(TimeUnit::Minutes);
        let report = Report::collect(&registry.snapshot(), &config);
        let text = ConsoleReporter::format(&report, fixed_now());

        assert!(text.contains("-- Timers --"));
        assert!(text.contains("events/minute"));
        assert!(text.contains("max = 250.00 milliseconds"));
    }

    #[test]
    fn test_report_writes_to_sink() {
        let buffer = SharedBuffer::new();
        let reporter = ConsoleReporter::with_writer(buffer.writer()).with_now(fixed_now);

        let registry = sample_registry();
        let report = Report::collect(&registry.snapshot(), &ReporterConfig::default());
        tokio_test::block_on(reporter.report(&report)).unwrap();

        assert_eq!(buffer.contents(), ConsoleReporter::format(&report, fixed_now()));
    }
}
