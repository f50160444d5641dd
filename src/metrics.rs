//! Metrics collection and export module

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub relay_requests_total: IntCounter,
    pub relay_success_total: IntCounter,
    pub relay_failed_total: IntCounter,
    pub relay_rejected_total: IntCounter,
    pub relay_timeout_total: IntCounter,

    // Gauges
    pub relay_inflight: IntGauge,

    // Histograms
    pub relay_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let relay_requests_total = IntCounter::with_opts(Opts::new(
            "relay_requests_total",
            "Total relay submissions received",
        ))?;

        let relay_success_total = IntCounter::with_opts(Opts::new(
            "relay_success_total",
            "Relay submissions confirmed on ledger",
        ))?;

        let relay_failed_total = IntCounter::with_opts(Opts::new(
            "relay_failed_total",
            "Relay submissions rejected by the network",
        ))?;

        let relay_rejected_total = IntCounter::with_opts(Opts::new(
            "relay_rejected_total",
            "Relay submissions rejected before reaching the network",
        ))?;

        let relay_timeout_total = IntCounter::with_opts(Opts::new(
            "relay_timeout_total",
            "Relay submissions with unknown outcome after polling",
        ))?;

        let relay_inflight = IntGauge::with_opts(Opts::new(
            "relay_inflight",
            "Relay submissions currently in progress",
        ))?;

        let relay_latency = Histogram::with_opts(HistogramOpts::new(
            "relay_latency_seconds",
            "End-to-end relay handling latency",
        ))?;

        registry.register(Box::new(relay_requests_total.clone()))?;
        registry.register(Box::new(relay_success_total.clone()))?;
        registry.register(Box::new(relay_failed_total.clone()))?;
        registry.register(Box::new(relay_rejected_total.clone()))?;
        registry.register(Box::new(relay_timeout_total.clone()))?;
        registry.register(Box::new(relay_inflight.clone()))?;
        registry.register(Box::new(relay_latency.clone()))?;

        Ok(Self {
            registry,
            relay_requests_total,
            relay_success_total,
            relay_failed_total,
            relay_rejected_total,
            relay_timeout_total,
            relay_inflight,
            relay_latency,
        })
    }

    /// Render the registry in Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

/// Process-wide metrics handle used by the relay server
pub static METRICS: Lazy<Metrics> = Lazy::new(|| Metrics::new().expect("metrics registry"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_counters() {
        METRICS.relay_requests_total.inc();
        let text = METRICS.gather();
        assert!(text.contains("relay_requests_total"));
        assert!(text.contains("relay_latency_seconds"));
    }
}
