//! Metrics Facade demo process
//!
//! Wires one [`MetricsConfig`] to a StatsD reporter and a console reporter,
//! registers a random gauge, process gauges and a random health check, runs
//! the example job processor, and polls health every second until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        metrics-facade                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ JobProcessor │───▶│   Registry   │───▶│  Reporters   │       │
//! │  │  (workload)  │    │ app.host.*   │    │ statsd · tty │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │                      ┌──────────────┐    ┌──────────────┐       │
//! │                      │ HealthChecks │───▶│ HealthPoller │       │
//! │                      └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use metrics_facade::config::{MetricsConfig, Overrides, Settings};
use metrics_facade::demo::{RandomGauge, RandomHealthCheck};
use metrics_facade::error::{Error, Result};
use metrics_facade::health::HealthPoller;
use metrics_facade::metrics::TimeUnit;
use metrics_facade::reporting::{
    ConsoleReporter, MetricFilter, ReporterConfig, ScheduledReporter, StatsdReporter,
};
use metrics_facade::resources;
use metrics_facade::workload::{JobProcessor, RandomJobSource, SimulatedHandler};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Metrics Facade - named metrics with console and StatsD reporting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file
    #[arg(long, env = "METRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Host identity used in the metric prefix (defaults to the system host name)
    #[arg(long, env = "HOST_NAME")]
    host_name: Option<String>,

    /// Application identity used in the metric prefix (defaults to "app")
    #[arg(long, env = "APP_NAME")]
    app_name: Option<String>,

    /// StatsD collector host
    #[arg(long, env = "STATSD_HOST")]
    statsd_host: Option<String>,

    /// StatsD collector port
    #[arg(long, env = "STATSD_PORT")]
    statsd_port: Option<u16>,

    /// Seconds between reporter ticks
    #[arg(long, env = "REPORT_INTERVAL_SECS")]
    report_interval_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            host_name: self.host_name.clone(),
            app_name: self.app_name.clone(),
            statsd_host: self.statsd_host.clone(),
            statsd_port: self.statsd_port,
            report_interval_secs: self.report_interval_secs,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let settings = load_settings(&args)?;

    let metrics = MetricsConfig::builder()
        .names(settings.host_name.clone(), settings.app_name.clone())
        .build();

    info!("Starting metrics facade");
    info!("  Prefix: {}", metrics.prefix());
    info!("  Report interval: {:?}", settings.report_interval());
    info!("  Health interval: {:?}", settings.health_interval());

    let shutdown = CancellationToken::new();
    let mut reporters = Vec::new();

    // StatsD reporter
    if settings.statsd.enabled {
        info!(
            "  StatsD: {}:{}",
            settings.statsd.host, settings.statsd.port
        );
        let statsd = StatsdReporter::udp(
            metrics.prefix(),
            &settings.statsd.host,
            settings.statsd.port,
        )
        .max_datagram_bytes(settings.statsd.max_datagram_bytes);

        let reporter = ScheduledReporter::new(
            Arc::clone(metrics.registry()),
            ReporterConfig::default().filter(MetricFilter::all()),
            statsd,
        );
        reporter.start(settings.report_interval())?;
        reporters.push(reporter);
    }

    // Console reporter
    if settings.console.enabled {
        let reporter = ScheduledReporter::new(
            Arc::clone(metrics.registry()),
            ReporterConfig::default()
                .convert_rates_to(TimeUnit::Seconds)
                .convert_durations_to(TimeUnit::Milliseconds),
            ConsoleReporter::new(),
        );
        reporter.start(settings.report_interval())?;
        reporters.push(reporter);
    }

    // Demo instruments
    metrics
        .registry()
        .register("requests", RandomGauge::from_entropy().into_gauge())?;
    resources::register_process_metrics(metrics.registry())?;
    metrics
        .health_checks()
        .register("database", RandomHealthCheck::from_entropy())?;

    // Example workload
    let workload = if settings.workload.enabled {
        let processor = JobProcessor::new(
            Arc::clone(metrics.registry()),
            settings.workload.batch_size,
            RandomJobSource::from_entropy(),
            SimulatedHandler::from_entropy(
                Duration::from_millis(settings.workload.max_latency_ms),
                settings.workload.failure_rate,
            ),
        )?;
        let token = shutdown.child_token();
        Some(tokio::spawn(async move {
            if let Err(e) = processor.run(token).await {
                error!("Job processor error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health poll loop
    let poller = Arc::new(HealthPoller::new(
        Arc::clone(metrics.health_checks()),
        settings.health_interval(),
    )?);
    let health = tokio::spawn(Arc::clone(&poller).run(shutdown.child_token()));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    shutdown.cancel();

    if let Some(workload) = workload {
        if let Err(e) = workload.await {
            error!("Job processor task failed: {}", e);
        }
    }
    if let Err(e) = health.await {
        error!("Health poller task failed: {}", e);
    }
    for reporter in &reporters {
        reporter.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_settings(args: &Args) -> Result<Settings> {
    let settings = match &args.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            Settings::from_file(path)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        }
        None => Settings::default(),
    };

    let settings = settings.apply(args.overrides());
    settings.validate()?;
    Ok(settings)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so the console report on stdout stays readable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
