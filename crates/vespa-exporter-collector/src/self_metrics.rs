use std::{sync::Arc, time::Duration};

use tracing::debug;
use vespa_exporter_common::error::Result;
use vespa_exporter_metrics::{CounterMetric, GaugeMetric, HistogramMetric, MetricsRegistry};

pub struct ExporterMetrics {
    discovered_endpoints: Arc<GaugeMetric>,
    discovery_errors_total: Arc<CounterMetric>,
    fetch_errors_total: Arc<CounterMetric>,
    fetch_duration_seconds: Arc<HistogramMetric>,
    skipped_fetches_total: Arc<CounterMetric>,
}

impl ExporterMetrics {
    pub fn register(registry: &MetricsRegistry, namespace: &str) -> Result<Self> {
        Ok(Self {
            discovered_endpoints: registry.register_gauge(
                &format!("{namespace}_exporter_discovered_endpoints"),
                "Endpoints per service type in the topology used by the last cycle",
                &["service"],
            )?,
            discovery_errors_total: registry.register_counter(
                &format!("{namespace}_exporter_discovery_errors_total"),
                "Failed attempts to read the cluster model from the config server",
                &[],
            )?,
            fetch_errors_total: registry.register_counter(
                &format!("{namespace}_exporter_fetch_errors_total"),
                "Failed metric fetches per endpoint",
                &["service", "host"],
            )?,
            fetch_duration_seconds: registry.register_histogram(
                &format!("{namespace}_exporter_fetch_duration_seconds"),
                "Time spent fetching and relaying one endpoint",
                &["service"],
                &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )?,
            skipped_fetches_total: registry.register_counter(
                &format!("{namespace}_exporter_skipped_fetches_total"),
                "Fetches not dispatched because the previous one was still running",
                &["service"],
            )?,
        })
    }

    pub fn set_discovered_endpoints(&self, service: &str, count: usize) {
        log_failure(
            self.discovered_endpoints
                .set(&[("service", service)], count as f64),
        );
    }

    pub fn record_discovery_error(&self) {
        log_failure(self.discovery_errors_total.inc_one(&[]));
    }

    pub fn record_fetch(&self, service: &str, duration: Duration) {
        log_failure(
            self.fetch_duration_seconds
                .observe(&[("service", service)], duration.as_secs_f64()),
        );
    }

    pub fn record_fetch_error(&self, service: &str, host: &str) {
        log_failure(
            self.fetch_errors_total
                .inc_one(&[("service", service), ("host", host)]),
        );
    }

    pub fn record_skipped_fetch(&self, service: &str) {
        log_failure(self.skipped_fetches_total.inc_one(&[("service", service)]));
    }

    pub fn fetch_errors(&self, service: &str, host: &str) -> u64 {
        self.fetch_errors_total
            .get(&[("service", service), ("host", host)])
    }

    pub fn skipped_fetches(&self, service: &str) -> u64 {
        self.skipped_fetches_total.get(&[("service", service)])
    }

    pub fn discovery_errors(&self) -> u64 {
        self.discovery_errors_total.get(&[])
    }
}

fn log_failure(result: Result<()>) {
    if let Err(err) = result {
        debug!(error = %err, "could not update exporter metric");
    }
}
