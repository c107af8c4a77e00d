use async_trait::async_trait;
use tracing::{debug, warn};
use vespa_exporter_common::error::Result;
use vespa_exporter_metrics::{MetricGate, names};

use crate::{
    collectors::{EndpointCollector, RelayedValue, select_dimensions},
    http::get_json,
    types::{Endpoint, StandardMetricsResponse},
};

const DIMENSIONS: &[&str] = &["documenttype", "field", "disk", "operationtype"];
const STATUS_HELP: &str = "Status code up?";

pub struct StandardServiceCollector {
    service_type: String,
    prefix: String,
    client: reqwest::Client,
    gate: MetricGate,
}

impl StandardServiceCollector {
    pub fn new(
        service_type: impl Into<String>,
        namespace: &str,
        client: reqwest::Client,
        gate: MetricGate,
    ) -> Self {
        let service_type = service_type.into();
        Self {
            prefix: names::substitute(&format!("{namespace}_{service_type}")),
            service_type,
            client,
            gate,
        }
    }

    pub fn status_metric_name(&self) -> String {
        format!("{}_status_code_up", self.prefix)
    }

    fn set_status(&self, host: &str, up: bool) -> Result<()> {
        self.gate
            .expose_always(&self.status_metric_name(), STATUS_HELP, &["host"])?
            .set(&[("host", host)], if up { 1.0 } else { 0.0 })
    }

    fn record(&self, host: &str, response: &StandardMetricsResponse) -> Result<()> {
        self.set_status(host, response.status.is_up())?;

        let snapshot = &response.metrics.snapshot;
        for (suffix, help, value) in [
            ("snapshot_to", "Snapshot to timestamp", snapshot.to),
            ("snapshot_from", "Snapshot from timestamp", snapshot.from),
        ] {
            let name = format!("{}_{suffix}", self.prefix);
            if let Some(gauge) = self.gate.expose(&name, help, &["host"])? {
                gauge.set(&[("host", host)], value)?;
            }
        }

        let mut written = 0;
        for entry in &response.metrics.values {
            let name = names::standard_metric_name(&self.prefix, &entry.name);
            let value = RelayedValue {
                name: &name,
                help: entry.description.as_deref().unwrap_or(&name),
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
            service = %self.service_type,
            endpoint = %host,
            values = response.metrics.values.len(),
            series = written,
            "updated metrics from endpoint"
        );
        Ok(())
    }
}

#[async_trait]
impl EndpointCollector for StandardServiceCollector {
    fn service_type(&self) -> &str {
        &self.service_type
    }

    async fn collect(&self, endpoint: &Endpoint) -> Result<()> {
        let host = endpoint.to_string();
        let fetched = match endpoint.metrics_url() {
            Ok(url) => get_json::<StandardMetricsResponse>(&self.client, &url).await,
            Err(err) => Err(err),
        };

        match fetched {
            Ok(response) => self.record(&host, &response),
            Err(err) => {
                if let Err(status_err) = self.set_status(&host, false) {
                    warn!(
                        endpoint = %host,
                        error = %status_err,
                        "could not mark endpoint down"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Router, routing::get};
    use vespa_exporter_common::ExporterError;
    use vespa_exporter_metrics::{AllowList, MetricGate, MetricsRegistry};

    use super::StandardServiceCollector;
    use crate::{
        collectors::EndpointCollector,
        config::METRICS_PATH,
        test_support::{serve, test_client, unused_port},
        types::Endpoint,
    };

    fn collector(allow_list: AllowList) -> (Arc<MetricsRegistry>, StandardServiceCollector) {
        let registry = Arc::new(MetricsRegistry::new());
        let gate = MetricGate::new(Arc::clone(&registry), Arc::new(allow_list));
        let collector = StandardServiceCollector::new("searchnode", "vespa", test_client(), gate);
        (registry, collector)
    }

    async fn serve_payload(payload: &'static str) -> Endpoint {
        let addr = serve(Router::new().route(METRICS_PATH, get(move || async move { payload }))).await;
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn relays_values_with_dimension_labels() {
        let endpoint = serve_payload(
            r#"{"status":{"code":"up"},"metrics":{"snapshot":{"from":1700000000,"to":1700000060},
                "values":[{"name":"my.metric-x","description":"d","dimensions":{"field":"f1"},"values":{"sum":3.5}}]}}"#,
        )
        .await;
        let host = endpoint.to_string();
        let (registry, collector) = collector(AllowList::permit_all());

        collector.collect(&endpoint).await.unwrap();

        let gauge = registry.gauge("vespa_searchnode_my_metric_x").unwrap();
        assert_eq!(gauge.descriptor().help, "d");
        assert_eq!(
            gauge.descriptor().label_names,
            vec!["aggregation", "host", "field"]
        );
        assert_eq!(
            gauge.get(&[("aggregation", "sum"), ("host", host.as_str()), ("field", "f1")]),
            Some(3.5)
        );

        let snapshot_to = registry.gauge("vespa_searchnode_snapshot_to").unwrap();
        assert_eq!(snapshot_to.get(&[("host", host.as_str())]), Some(1700000060.0));
        let status = registry.gauge("vespa_searchnode_status_code_up").unwrap();
        assert_eq!(status.get(&[("host", host.as_str())]), Some(1.0));
    }

    #[tokio::test]
    async fn allow_list_gates_everything_but_status() {
        let endpoint = serve_payload(
            r#"{"status":{"code":"initializing"},"metrics":{"snapshot":{"from":1,"to":2},"values":[
                {"name":"allowed_metric","description":"a","values":{"max":7,"min":1}},
                {"name":"other_metric","description":"o","values":{"max":9}}]}}"#,
        )
        .await;
        let host = endpoint.to_string();
        let (registry, collector) =
            collector(AllowList::from_names(["vespa_searchnode_allowed_metric"]));

        collector.collect(&endpoint).await.unwrap();

        assert!(registry.contains("vespa_searchnode_allowed_metric"));
        assert!(!registry.contains("vespa_searchnode_other_metric"));
        assert!(!registry.contains("vespa_searchnode_snapshot_to"));
        assert!(!registry.render_prometheus().contains("other_metric"));

        let allowed = registry.gauge("vespa_searchnode_allowed_metric").unwrap();
        assert_eq!(
            allowed.get(&[("aggregation", "min"), ("host", host.as_str())]),
            Some(1.0)
        );
        let status = registry.gauge("vespa_searchnode_status_code_up").unwrap();
        assert_eq!(status.get(&[("host", host.as_str())]), Some(0.0));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_marked_down() {
        let endpoint = Endpoint::new("127.0.0.1", unused_port().await);
        let (registry, collector) = collector(AllowList::from_names(["nothing_else"]));

        let host = endpoint.to_string();
        let err = collector.collect(&endpoint).await.unwrap_err();

        assert!(matches!(err, ExporterError::Transport { .. }));
        let status = registry.gauge("vespa_searchnode_status_code_up").unwrap();
        assert_eq!(status.get(&[("host", host.as_str())]), Some(0.0));
    }

    #[tokio::test]
    async fn malformed_payload_is_marked_down() {
        let endpoint = serve_payload(r#"{"metrics":{"values":[]}}"#).await;
        let (registry, collector) = collector(AllowList::permit_all());

        let host = endpoint.to_string();
        let err = collector.collect(&endpoint).await.unwrap_err();

        assert!(matches!(err, ExporterError::MalformedResponse { .. }));
        let status = registry.gauge("vespa_searchnode_status_code_up").unwrap();
        assert_eq!(status.get(&[("host", host.as_str())]), Some(0.0));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn conflicting_label_sets_keep_first_registration() {
        let endpoint = serve_payload(
            r#"{"status":{"code":"up"},"metrics":{"snapshot":{"from":1,"to":2},"values":[
                {"name":"docs","description":"Documents","dimensions":{"documenttype":"music"},"values":{"last":10}},
                {"name":"docs","description":"Documents","values":{"last":12}},
                {"name":"queries","description":"Queries","values":{"rate":2.5}}]}}"#,
        )
        .await;
        let host = endpoint.to_string();
        let (registry, collector) = collector(AllowList::permit_all());

        collector.collect(&endpoint).await.unwrap();

        let docs = registry.gauge("vespa_searchnode_docs").unwrap();
        assert_eq!(
            docs.get(&[("aggregation", "last"), ("host", host.as_str()), ("documenttype", "music")]),
            Some(10.0)
        );
        let queries = registry.gauge("vespa_searchnode_queries").unwrap();
        assert_eq!(
            queries.get(&[("aggregation", "rate"), ("host", host.as_str())]),
            Some(2.5)
        );
    }

    #[tokio::test]
    async fn names_illegal_for_exposition_are_skipped() {
        let endpoint = serve_payload(
            r#"{"status":{"code":"up"},"metrics":{"snapshot":{"from":1,"to":2},"values":[
                {"name":"disk/usage pct","description":"bad","values":{"last":0.5}},
                {"name":"queries","description":"Queries","values":{"rate":2.5}}]}}"#,
        )
        .await;
        let host = endpoint.to_string();
        let (registry, collector) = collector(AllowList::permit_all());

        collector.collect(&endpoint).await.unwrap();

        assert!(!registry.contains("vespa_searchnode_disk/usage pct"));
        assert!(!registry.render_prometheus().contains("disk/usage"));
        let queries = registry.gauge("vespa_searchnode_queries").unwrap();
        assert_eq!(
            queries.get(&[("aggregation", "rate"), ("host", host.as_str())]),
            Some(2.5)
        );
    }
}
