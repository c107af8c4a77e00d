use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, error};
use vespa_exporter_common::error::Result;
use vespa_exporter_metrics::{AllowList, MetricGate, MetricsRegistry};

use crate::{
    collectors::{ContainerCollector, EndpointCollector, StandardServiceCollector},
    config::ExporterConfig,
    discovery::TopologyDiscovery,
    self_metrics::ExporterMetrics,
    types::Endpoint,
};

pub const STANDARD_SERVICES: &[&str] = &["searchnode", "distributor"];

type InFlightSet = Arc<Mutex<HashSet<(String, Endpoint)>>>;

pub struct CollectionCycle {
    discovery: TopologyDiscovery,
    collectors: Vec<Arc<dyn EndpointCollector>>,
    metrics: Arc<ExporterMetrics>,
    in_flight: InFlightSet,
    permits: Arc<Semaphore>,
    interval: Duration,
}

impl CollectionCycle {
    pub fn new(
        config: &ExporterConfig,
        registry: Arc<MetricsRegistry>,
        allow_list: AllowList,
    ) -> Result<Self> {
        config.validate()?;
        let client = config.http_client()?;
        let gate = MetricGate::new(Arc::clone(&registry), Arc::new(allow_list));

        let mut collectors = STANDARD_SERVICES
            .iter()
            .map(|service| {
                Arc::new(StandardServiceCollector::new(
                    *service,
                    &config.namespace,
                    client.clone(),
                    gate.clone(),
                )) as Arc<dyn EndpointCollector>
            })
            .collect::<Vec<_>>();
        collectors.push(Arc::new(ContainerCollector::new(
            &config.namespace,
            client,
            gate,
        )));

        let metrics = Arc::new(ExporterMetrics::register(&registry, &config.namespace)?);
        Ok(Self::with_collectors(
            config,
            TopologyDiscovery::new(config)?,
            collectors,
            metrics,
        ))
    }

    pub fn with_collectors(
        config: &ExporterConfig,
        discovery: TopologyDiscovery,
        collectors: Vec<Arc<dyn EndpointCollector>>,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        Self {
            discovery,
            collectors,
            metrics,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            interval: config.interval,
        }
    }

    pub fn discovery(&self) -> &TopologyDiscovery {
        &self.discovery
    }

    pub fn metrics(&self) -> &Arc<ExporterMetrics> {
        &self.metrics
    }

    pub async fn run(self) {
        loop {
            self.run_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn run_once(&self) -> Vec<JoinHandle<()>> {
        let refresh = match self.discovery.refresh().await {
            Ok(refresh) => refresh,
            Err(err) => {
                self.metrics.record_discovery_error();
                error!(error = %err, "skipping collection cycle");
                return Vec::new();
            }
        };
        if refresh.stale {
            self.metrics.record_discovery_error();
        }

        let mut handles = Vec::new();
        for collector in &self.collectors {
            let service = collector.service_type();
            let endpoints = refresh.topology.endpoints(service);
            self.metrics.set_discovered_endpoints(service, endpoints.len());

            for endpoint in endpoints {
                match self.dispatch(Arc::clone(collector), endpoint.clone()) {
                    Some(handle) => handles.push(handle),
                    None => {
                        self.metrics.record_skipped_fetch(service);
                        debug!(
                            service = %service,
                            endpoint = %endpoint,
                            "previous fetch still running, skipping endpoint"
                        );
                    }
                }
            }
        }

        debug!(
            tasks = handles.len(),
            stale = refresh.stale,
            "dispatched collection tasks"
        );
        handles
    }

    fn dispatch(
        &self,
        collector: Arc<dyn EndpointCollector>,
        endpoint: Endpoint,
    ) -> Option<JoinHandle<()>> {
        let claim = InFlightClaim::acquire(&self.in_flight, collector.service_type(), &endpoint)?;
        let permits = Arc::clone(&self.permits);
        let metrics = Arc::clone(&self.metrics);

        Some(tokio::spawn(async move {
            let _claim = claim;
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let service = collector.service_type();
            let started = Instant::now();
            let result = collector.collect(&endpoint).await;
            metrics.record_fetch(service, started.elapsed());

            if let Err(err) = result {
                metrics.record_fetch_error(service, &endpoint.to_string());
                error!(
                    service = %service,
                    endpoint = %endpoint,
                    error = %err,
                    "could not update metrics from endpoint"
                );
            }
        }))
    }
}

struct InFlightClaim {
    set: InFlightSet,
    key: (String, Endpoint),
}

impl InFlightClaim {
    fn acquire(set: &InFlightSet, service: &str, endpoint: &Endpoint) -> Option<Self> {
        let key = (service.to_string(), endpoint.clone());
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());

        inserted.then(|| Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
