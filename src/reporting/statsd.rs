//! StatsD reporter
//!
//! Every numeric field becomes one `<prefix>.<name>:<value>|<type>` line.
//! Lines are packed into newline-separated datagrams.

use std::io;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Distribution, MeterReading, Reading, Report, Reporter};
use crate::error::{Error, Result};

/// Default payload budget, sized to fit an Ethernet MTU
pub const DEFAULT_MAX_DATAGRAM_BYTES: usize = 1432;

/// Where encoded datagrams go
#[async_trait]
pub trait DatagramTransport: Send + Sync + 'static {
    async fn send(&self, payload: &[u8]) -> io::Result<()>;
}

// =============================================================================
// UDP transport
// =============================================================================

/// Connectionless UDP sender
///
/// The socket is created on first send and dropped after an error, so an
/// unreachable collector never blocks reporting.
pub struct UdpTransport {
    target: String,
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            target: format!("{}:{}", host, port),
            socket: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0").await?;
            socket.connect(self.target.as_str()).await?;
            debug!(addr = %self.target, "StatsD socket connected");
            *guard = Some(socket);
        }

        let result = match guard.as_ref() {
            Some(socket) => socket.send(payload).await.map(|_| ()),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no socket")),
        };
        if result.is_err() {
            *guard = None;
        }
        result
    }
}

// =============================================================================
// Reporter
// =============================================================================

/// Ships reports to a StatsD-compatible collector
pub struct StatsdReporter {
    prefix: String,
    max_datagram_bytes: usize,
    transport: Box<dyn DatagramTransport>,
}

impl StatsdReporter {
    pub fn new(prefix: impl Into<String>, transport: impl DatagramTransport) -> Self {
        Self {
            prefix: prefix.into(),
            max_datagram_bytes: DEFAULT_MAX_DATAGRAM_BYTES,
            transport: Box::new(transport),
        }
    }

    /// Reporter sending over UDP to `host:port`
    pub fn udp(prefix: impl Into<String>, host: &str, port: u16) -> Self {
        Self::new(prefix, UdpTransport::new(host, port))
    }

    pub fn max_datagram_bytes(mut self, bytes: usize) -> Self {
        self.max_datagram_bytes = bytes.max(1);
        self
    }

    /// Wire lines for `report`, in report order
    pub fn encode(&self, report: &Report) -> Vec<String> {
        let mut lines = Vec::new();
        for (name, reading) in &report.entries {
            let key = self.key(name);
            encode_reading(&mut lines, &key, reading);
        }
        lines
    }

    /// Group lines into newline-separated payloads of at most the byte budget
    ///
    /// A single line longer than the budget is sent on its own.
    pub fn pack(&self, lines: &[String]) -> Vec<String> {
        let mut datagrams = Vec::new();
        let mut current = String::new();

        for line in lines {
            if !current.is_empty() && current.len() + 1 + line.len() > self.max_datagram_bytes {
                datagrams.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        if !current.is_empty() {
            datagrams.push(current);
        }
        datagrams
    }

    fn key(&self, name: &str) -> String {
        let name = sanitize(name);
        if self.prefix.is_empty() {
            name
        } else {
            format!("{}.{}", sanitize(&self.prefix), name)
        }
    }
}

#[async_trait]
impl Reporter for StatsdReporter {
    fn name(&self) -> &'static str {
        "statsd"
    }

    async fn report(&self, report: &Report) -> Result<()> {
        let lines = self.encode(report);
        let mut first_error = None;

        for datagram in self.pack(&lines) {
            if let Err(e) = self.transport.send(datagram.as_bytes()).await {
                warn!(error = %e, bytes = datagram.len(), "Failed to send StatsD datagram");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(Error::Sink(format!("statsd: {}", e))),
            None => Ok(()),
        }
    }
}

/// Replace characters that carry meaning in the line protocol
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ':' | '|' | '@' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

fn format_value(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Some(format!("{}", value as i64))
    } else {
        let text = format!("{:.6}", value);
        Some(text.trim_end_matches('0').trim_end_matches('.').to_string())
    }
}

fn push(lines: &mut Vec<String>, key: &str, value: f64, kind: &str) {
    if let Some(value) = format_value(value) {
        lines.push(format!("{}:{}|{}", key, value, kind));
    }
}

fn encode_reading(lines: &mut Vec<String>, key: &str, reading: &Reading) {
    match reading {
        Reading::Gauge { value } => {
            if let Some(v) = value.as_f64() {
                push(lines, key, v, "g");
            }
        }
        Reading::Counter { count } => lines.push(format!("{}:{}|g", key, count)),
        Reading::Meter(meter) => encode_meter(lines, key, meter),
        Reading::Histogram(distribution) => {
            lines.push(format!("{}.count:{}|g", key, distribution.count));
            encode_distribution(lines, key, distribution, "g");
        }
        Reading::Timer { rates, durations } => {
            encode_meter(lines, key, rates);
            encode_distribution(lines, key, durations, "ms");
        }
    }
}

fn encode_meter(lines: &mut Vec<String>, key: &str, meter: &MeterReading) {
    lines.push(format!("{}.count:{}|g", key, meter.count));
    push(lines, &format!("{}.m1_rate", key), meter.m1_rate, "g");
    push(lines, &format!("{}.m5_rate", key), meter.m5_rate, "g");
    push(lines, &format!("{}.m15_rate", key), meter.m15_rate, "g");
    push(lines, &format!("{}.mean_rate", key), meter.mean_rate, "g");
}

fn encode_distribution(lines: &mut Vec<String>, key: &str, d: &Distribution, kind: &str) {
    let fields = [
        ("min", d.min),
        ("max", d.max),
        ("mean", d.mean),
        ("stddev", d.std_dev),
        ("p50", d.median),
        ("p75", d.p75),
        ("p95", d.p95),
        ("p98", d.p98),
        ("p99", d.p99),
        ("p999", d.p999),
    ];
    for (suffix, value) in fields {
        push(lines, &format!("{}.{}", key, suffix), value, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;
    use crate::reporting::ReporterConfig;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Captured {
        datagrams: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DatagramTransport for Captured {
        async fn send(&self, payload: &[u8]) -> io::Result<()> {
            self.datagrams
                .lock()
                .push(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl DatagramTransport for Unreachable {
        async fn send(&self, _payload: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    fn report_of(registry: &MetricRegistry) -> Report {
        Report::collect(&registry.snapshot(), &ReporterConfig::default())
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a b:c|d@e"), "a_b_c_d_e");
        assert_eq!(sanitize("jobs.completed.acme"), "jobs.completed.acme");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(3.0).as_deref(), Some("3"));
        assert_eq!(format_value(0.5).as_deref(), Some("0.5"));
        assert_eq!(format_value(1e-9).as_deref(), Some("0"));
        assert_eq!(format_value(f64::NAN), None);
    }

    #[test]
    fn test_encode_counter_and_gauge() {
        let registry = MetricRegistry::new();
        registry.counter("jobs.pending").unwrap().inc_by(4);
        registry.gauge("requests", || 17).unwrap();
        registry.gauge("status", || "up").unwrap();

        let reporter = StatsdReporter::new("app.host", Captured::default());
        let lines = reporter.encode(&report_of(&registry));

        assert_eq!(
            lines,
            vec!["app.host.jobs.pending:4|g", "app.host.requests:17|g"]
        );
    }

    #[test]
    fn test_encode_meter_fields() {
        let registry = MetricRegistry::new();
        registry.meter("jobs.failed").unwrap().mark_n(2);

        let reporter = StatsdReporter::new("p", Captured::default());
        let lines = reporter.encode(&report_of(&registry));

        assert_eq!(lines[0], "p.jobs.failed.count:2|g");
        for suffix in ["m1_rate", "m5_rate", "m15_rate", "mean_rate"] {
            let key = format!("p.jobs.failed.{}:", suffix);
            assert!(lines.iter().any(|l| l.starts_with(&key) && l.ends_with("|g")));
        }
    }

    #[test]
    fn test_encode_timer_durations() {
        let registry = MetricRegistry::new();
        registry
            .timer("latency")
            .unwrap()
            .update(Duration::from_millis(12));

        let reporter = StatsdReporter::new("", Captured::default());
        let lines = reporter.encode(&report_of(&registry));

        assert!(lines.contains(&"latency.max:12|ms".to_string()));
        assert!(lines.contains(&"latency.p999:12|ms".to_string()));
        assert!(lines.contains(&"latency.count:1|g".to_string()));
    }

    #[test]
    fn test_pack_respects_budget() {
        let reporter = StatsdReporter::new("", Captured::default()).max_datagram_bytes(10);
        let lines: Vec<String> = ["a:1|g", "b:2|g", "averyverylongname:3|g"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let datagrams = reporter.pack(&lines);
        assert_eq!(datagrams, vec!["a:1|g", "b:2|g", "averyverylongname:3|g"]);

        let roomy = StatsdReporter::new("", Captured::default()).max_datagram_bytes(64);
        assert_eq!(roomy.pack(&lines).len(), 1);
        assert!(roomy.pack(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_report_sends_datagrams() {
        let registry = MetricRegistry::new();
        registry.counter("a").unwrap().inc();
        registry.counter("b").unwrap().inc_by(2);

        let transport = Captured::default();
        let reporter = StatsdReporter::new("app.host", transport.clone());
        reporter.report(&report_of(&registry)).await.unwrap();

        assert_eq!(
            *transport.datagrams.lock(),
            vec!["app.host.a:1|g\napp.host.b:2|g".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_sink_error() {
        let registry = MetricRegistry::new();
        registry.counter("a").unwrap();

        let reporter = StatsdReporter::new("p", Unreachable);
        let err = reporter.report(&report_of(&registry)).await.unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }

    #[tokio::test]
    async fn test_udp_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let transport = UdpTransport::new("127.0.0.1", port);
        transport.send(b"app.host.requests:5|g").await.unwrap();

        let mut buf = [0u8; 256];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"app.host.requests:5|g");
    }
}
