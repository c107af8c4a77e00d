pub mod container;
pub mod standard;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use vespa_exporter_common::error::{ExporterError, Result};
use vespa_exporter_metrics::{MetricGate, names};

use crate::types::Endpoint;

pub use container::ContainerCollector;
pub use standard::StandardServiceCollector;

#[async_trait]
pub trait EndpointCollector: Send + Sync {
    fn service_type(&self) -> &str;

    async fn collect(&self, endpoint: &Endpoint) -> Result<()>;
}

pub(crate) struct RelayedValue<'a> {
    pub name: &'a str,
    pub help: &'a str,
    pub host: &'a str,
    pub dimensions: Vec<(String, &'a str)>,
    pub aggregations: &'a BTreeMap<String, f64>,
}

impl RelayedValue<'_> {
    pub(crate) fn relay(&self, gate: &MetricGate) -> Result<usize> {
        if !names::is_valid_metric_name(self.name) {
            return Err(ExporterError::InvalidArgument(format!(
                "invalid metric name: {}",
                self.name
            )));
        }

        let mut label_names = vec!["aggregation", "host"];
        label_names.extend(self.dimensions.iter().map(|(label, _)| label.as_str()));

        let Some(gauge) = gate.expose(self.name, self.help, &label_names)? else {
            return Ok(0);
        };

        let mut labels = vec![("aggregation", ""), ("host", self.host)];
        labels.extend(
            self.dimensions
                .iter()
                .map(|(label, value)| (label.as_str(), *value)),
        );

        for (aggregation, value) in self.aggregations {
            labels[0].1 = aggregation.as_str();
            gauge.set(&labels, *value)?;
        }
        Ok(self.aggregations.len())
    }
}

pub(crate) fn select_dimensions<'a>(
    dimensions: &'a HashMap<String, String>,
    allowed: &[&str],
) -> Vec<(String, &'a str)> {
    allowed
        .iter()
        .filter_map(|dimension| {
            dimensions
                .get(*dimension)
                .map(|value| (dimension.to_lowercase(), value.as_str()))
        })
        .collect()
}
