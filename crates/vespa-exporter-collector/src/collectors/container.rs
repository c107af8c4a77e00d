use async_trait::async_trait;
use tracing::{debug, warn};
use vespa_exporter_common::error::Result;
use vespa_exporter_metrics::{MetricGate, names};

use crate::{
    collectors::{EndpointCollector, RelayedValue, select_dimensions},
    http::get_json,
    types::{ContainerMetricsResponse, Endpoint},
};

pub const CONTAINER_SERVICE: &str = "container";

const DIMENSIONS: &[&str] = &[
    "chain",
    "handler",
    "api",
    "operation",
    "status",
    "serverName",
    "serverPort",
];

pub struct ContainerCollector {
    prefix: String,
    client: reqwest::Client,
    gate: MetricGate,
}

impl ContainerCollector {
    pub fn new(namespace: &str, client: reqwest::Client, gate: MetricGate) -> Self {
        Self {
            prefix: names::substitute(&format!("{namespace}_{CONTAINER_SERVICE}")),
            client,
            gate,
        }
    }

    fn record(&self, host: &str, response: &ContainerMetricsResponse) {
        let mut written = 0;
        for entry in &response.metrics.values {
            let name = names::container_metric_name(&self.prefix, &entry.name);
            let value = RelayedValue {
                name: &name,
                help: &name,
                host,
                dimensions: select_dimensions(&entry.dimensions, DIMENSIONS),
                aggregations: &entry.values,
            };
            match value.relay(&self.gate) {
                Ok(series) => written += series,
                Err(err) => warn!(
                    endpoint = %host,
                    metric = %name,
                    error = %err,
                    "skipping metric value"
                ),
            }
        }

        debug!(
            service = CONTAINER_SERVICE,
            endpoint = %host,
            values = response.metrics.values.len(),
            series = written,
            "updated metrics from endpoint"
        );
    }
}

#[async_trait]
impl EndpointCollector for ContainerCollector {
    fn service_type(&self) -> &str {
        CONTAINER_SERVICE
    }

    async fn collect(&self, endpoint: &Endpoint) -> Result<()> {
        let url = endpoint.metrics_url()?;
        let response: ContainerMetricsResponse = get_json(&self.client, &url).await?;
        self.record(&endpoint.to_string(), &response);
        Ok(())
    }
}
