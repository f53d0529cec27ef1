//! Metrics collection and Prometheus integration service.

use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub app_uptime_seconds: Gauge,
    pub app_info: CounterVec,
    /// Live subject keys held by each window
    pub window_keys: GaugeVec,
    /// Rule firings by rule and dispatch outcome
    pub rule_triggers_total: CounterVec,
    /// ASN resolutions by result (hit, miss, error)
    pub asn_lookups_total: CounterVec,
    /// Posted metrics by their service and forwarding outcome
    pub relayed_metrics_total: CounterVec,
    pub start_time: Instant,
}

impl AppMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?;

        let app_uptime_seconds = Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;

        let app_info = CounterVec::new(
            Opts::new("app_info", "Application information"),
            &["version", "commit", "build_time"],
        )?;

        let window_keys = GaugeVec::new(
            Opts::new("cerberus_window_keys", "Subject keys currently tracked per window"),
            &["window"],
        )?;

        let rule_triggers_total = CounterVec::new(
            Opts::new(
                "cerberus_rule_triggers_total",
                "Rule firings by rule and action outcome",
            ),
            &["rule", "outcome"],
        )?;

        let asn_lookups_total = CounterVec::new(
            Opts::new("asn_lookups_total", "ASN resolutions by result"),
            &["result"],
        )?;

        let relayed_metrics_total = CounterVec::new(
            Opts::new(
                "relayed_metrics_total",
                "Metrics posted to the relay by service and outcome",
            ),
            &["service", "outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(app_info.clone()))?;
        registry.register(Box::new(window_keys.clone()))?;
        registry.register(Box::new(rule_triggers_total.clone()))?;
        registry.register(Box::new(asn_lookups_total.clone()))?;
        registry.register(Box::new(relayed_metrics_total.clone()))?;

        let start_time = Instant::now();

        app_info
            .with_label_values(&[
                env!("CARGO_PKG_VERSION"),
                option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
                option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
            ])
            .inc();

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            app_uptime_seconds,
            app_info,
            window_keys,
            rule_triggers_total,
            asn_lookups_total,
            relayed_metrics_total,
            start_time,
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            // Scrapes would otherwise dominate the request counters
            return;
        }

        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, status.as_str(), route])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    pub fn set_window_keys(&self, window: &str, keys: usize) {
        self.window_keys.with_label_values(&[window]).set(keys as f64);
    }

    pub fn record_trigger(&self, rule: &str, outcome: &str) {
        self.rule_triggers_total
            .with_label_values(&[rule, outcome])
            .inc();
    }

    pub fn record_asn_lookup(&self, result: &str) {
        self.asn_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_relayed(&self, service: &str, outcome: &str) {
        self.relayed_metrics_total
            .with_label_values(&[service, outcome])
            .inc();
    }

    /// Update the application uptime gauge
    pub fn update_uptime(&self) {
        let uptime = self.start_time.elapsed().as_secs_f64();
        self.app_uptime_seconds.set(uptime);
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}
