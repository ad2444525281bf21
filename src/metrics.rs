//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub probes_total: IntCounter,
    pub probes_alive: IntCounter,
    pub probe_failures: IntCounterVec,

    // Gauges
    pub registry_networks: IntGauge,
    pub probes_in_flight: IntGauge,

    // Histograms
    pub probe_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let probes_total = IntCounter::with_opts(Opts::new(
            "probes_total",
            "Total number of RPC endpoint probes started",
        ))?;

        let probes_alive = IntCounter::with_opts(Opts::new(
            "probes_alive",
            "Number of probes that found the endpoint alive",
        ))?;

        let probe_failures = IntCounterVec::new(
            Opts::new("probe_failures_total", "Number of failed probes by cause"),
            &["kind"],
        )?;

        let registry_networks = IntGauge::with_opts(Opts::new(
            "registry_networks",
            "Number of networks in the registry",
        ))?;

        let probes_in_flight = IntGauge::with_opts(Opts::new(
            "probes_in_flight",
            "Number of probes currently running",
        ))?;

        let probe_latency = Histogram::with_opts(
            HistogramOpts::new(
                "probe_latency_seconds",
                "Time from probe start to confirmed block number",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(probes_total.clone()))?;
        registry.register(Box::new(probes_alive.clone()))?;
        registry.register(Box::new(probe_failures.clone()))?;
        registry.register(Box::new(registry_networks.clone()))?;
        registry.register(Box::new(probes_in_flight.clone()))?;
        registry.register(Box::new(probe_latency.clone()))?;

        Ok(Self {
            registry,
            probes_total,
            probes_alive,
            probe_failures,
            registry_networks,
            probes_in_flight,
            probe_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a failed probe under its error kind
    pub fn record_failure(&self, kind: &str) {
        self.probe_failures.with_label_values(&[kind]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_probe_metrics() {
        let m = metrics();
        m.probes_total.inc();
        m.record_failure("timeout");

        let text = m.render().unwrap();
        assert!(text.contains("probes_total"));
        assert!(text.contains("probe_failures_total{kind=\"timeout\"}"));
    }
}
