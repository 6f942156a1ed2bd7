//! Point-in-time readings of registered metrics
//!
//! A [`Report`] is what every reporter formats: the registry snapshot after
//! filtering, with each metric read once and its rates and durations already
//! converted to the configured units.

use tracing::warn;

use super::ReporterConfig;
use crate::error::Result;
use crate::metrics::{GaugeValue, HistogramSnapshot, Meter, Metric, TimeUnit};

/// Meter values, rates per `rate_unit`
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    pub count: u64,
    pub mean_rate: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
}

impl MeterReading {
    pub fn read(meter: &Meter, rate_unit: TimeUnit) -> Self {
        Self {
            count: meter.count(),
            mean_rate: rate_unit.convert_rate(meter.mean_rate()),
            m1_rate: rate_unit.convert_rate(meter.one_minute_rate()),
            m5_rate: rate_unit.convert_rate(meter.five_minute_rate()),
            m15_rate: rate_unit.convert_rate(meter.fifteen_minute_rate()),
        }
    }
}

/// Distribution statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Distribution {
    /// Statistics of `snapshot`, each value passed through `scale`
    pub fn from_snapshot(count: u64, snapshot: &HistogramSnapshot, scale: impl Fn(f64) -> f64) -> Self {
        Self {
            count,
            min: scale(snapshot.min() as f64),
            max: scale(snapshot.max() as f64),
            mean: scale(snapshot.mean()),
            std_dev: scale(snapshot.std_dev()),
            median: scale(snapshot.median()),
            p75: scale(snapshot.p75()),
            p95: scale(snapshot.p95()),
            p98: scale(snapshot.p98()),
            p99: scale(snapshot.p99()),
            p999: scale(snapshot.p999()),
        }
    }
}

/// Value of one metric at report time
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Gauge { value: GaugeValue },
    Counter { count: i64 },
    Meter(MeterReading),
    Histogram(Distribution),
    Timer {
        rates: MeterReading,
        /// Durations in `duration_unit`
        durations: Distribution,
    },
}

impl Reading {
    /// Read `metric` once
    ///
    /// Only gauges can fail: their function is user code.
    pub fn read(metric: &Metric, rate_unit: TimeUnit, duration_unit: TimeUnit) -> Result<Self> {
        Ok(match metric {
            Metric::Gauge(gauge) => Reading::Gauge {
                value: gauge.value()?,
            },
            Metric::Counter(counter) => Reading::Counter {
                count: counter.count(),
            },
            Metric::Meter(meter) => Reading::Meter(MeterReading::read(meter, rate_unit)),
            Metric::Histogram(histogram) => Reading::Histogram(Distribution::from_snapshot(
                histogram.count(),
                &histogram.snapshot(),
                |v| v,
            )),
            Metric::Timer(timer) => Reading::Timer {
                rates: MeterReading::read(timer.meter(), rate_unit),
                durations: Distribution::from_snapshot(timer.count(), &timer.snapshot(), |v| {
                    duration_unit.convert_duration(v)
                }),
            },
        })
    }
}

/// One tick's worth of readings
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub rate_unit: TimeUnit,
    pub duration_unit: TimeUnit,
    /// Sorted by name
    pub entries: Vec<(String, Reading)>,
}

impl Report {
    /// Filter and read a registry snapshot
    ///
    /// A metric whose read fails is logged and left out of this report only.
    pub fn collect(snapshot: &[(String, Metric)], config: &ReporterConfig) -> Self {
        let entries = snapshot
            .iter()
            .filter(|(name, metric)| config.filter.matches(name, metric))
            .filter_map(|(name, metric)| {
                match Reading::read(metric, config.rate_unit, config.duration_unit) {
                    Ok(reading) => Some((name.clone(), reading)),
                    Err(e) => {
                        warn!(metric = %name, error = %e, "Skipping metric for this report");
                        None
                    }
                }
            })
            .collect();

        Self {
            rate_unit: config.rate_unit,
            duration_unit: config.duration_unit,
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
