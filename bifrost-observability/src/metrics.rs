use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Request counters, a latency histogram, and an active-connections gauge.
///
/// Carried forward ambiently (rate limiting and richer metrics are out of
/// scope, but simple counters are not — see the ambient-stack rationale).
pub struct MetricsCollector {
    registry: Registry,

    /// Total HTTP requests by route, method, status.
    pub http_requests_total: IntCounterVec,

    /// Request latency histogram by route.
    pub http_request_duration: HistogramVec,

    /// Active connections gauge.
    pub active_connections: IntGauge,

    /// Upstream response time histogram.
    pub upstream_latency: HistogramVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("bifrost_http_requests_total", "Total HTTP requests").namespace("bifrost"),
            &["route", "method", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("bifrost_http_request_duration_seconds", "Request latency")
                .namespace("bifrost")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            &["route"],
        )?;

        let active_connections =
            IntGauge::new("bifrost_active_connections", "Number of active connections")?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new("bifrost_upstream_latency_seconds", "Upstream response time")
                .namespace("bifrost")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["upstream"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            active_connections,
            upstream_latency,
        })
    }

    /// Record a completed HTTP request.
    pub fn record_request(&self, route: &str, method: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[route, method, &status.to_string()])
            .inc();
        self.http_request_duration.with_label_values(&[route]).observe(duration_secs);
    }

    pub fn record_upstream_latency(&self, upstream: &str, duration_secs: f64) {
        self.upstream_latency.with_label_values(&[upstream]).observe(duration_secs);
    }

    /// Prometheus text exposition, served at the admin surface's `/metrics`.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to construct metrics registry")
    }
}
