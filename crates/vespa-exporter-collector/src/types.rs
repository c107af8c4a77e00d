use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;
use vespa_exporter_common::error::{ExporterError, Result};

use crate::config::METRICS_PATH;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn metrics_url(&self) -> Result<Url> {
        Url::parse(&format!("http://{self}{METRICS_PATH}")).map_err(|err| {
            ExporterError::InvalidArgument(format!("invalid endpoint {self}: {err}"))
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    services: BTreeMap<String, Vec<Endpoint>>,
    refreshed_at: DateTime<Utc>,
}

impl Topology {
    pub fn from_model(model: &ClusterModel, refreshed_at: DateTime<Utc>) -> Self {
        let mut services: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
        for host in &model.hosts {
            for service in &host.services {
                for port in &service.ports {
                    if !(port.has_tag("http") && port.has_tag("state")) {
                        continue;
                    }
                    let endpoint = Endpoint::new(host.name.clone(), port.number);
                    let endpoints = services.entry(service.service_type.clone()).or_default();
                    if !endpoints.contains(&endpoint) {
                        endpoints.push(endpoint);
                    }
                }
            }
        }

        Self {
            services,
            refreshed_at,
        }
    }

    pub fn endpoints(&self, service_type: &str) -> &[Endpoint] {
        self.services
            .get(service_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total_endpoints(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn same_endpoints(&self, other: &Topology) -> bool {
        self.services == other.services
    }

    pub fn to_host_ports(&self) -> BTreeMap<String, Vec<String>> {
        self.services
            .iter()
            .map(|(service, endpoints)| {
                (
                    service.clone(),
                    endpoints.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }
}

// Configuration server model.

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterModel {
    pub hosts: Vec<HostModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostModel {
    pub name: String,
    #[serde(default)]
    pub services: Vec<ServiceModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceModel {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub ports: Vec<PortModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortModel {
    pub number: u16,
    #[serde(default)]
    pub tags: String,
}

impl PortModel {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.split_whitespace().any(|candidate| candidate == tag)
    }
}

// Node `/state/v1/metrics` payloads.

#[derive(Debug, Clone, Deserialize)]
pub struct StandardMetricsResponse {
    pub status: StatusModel,
    pub metrics: StandardMetricsModel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusModel {
    pub code: String,
}

impl StatusModel {
    pub fn is_up(&self) -> bool {
        self.code == "up"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardMetricsModel {
    pub snapshot: SnapshotModel,
    #[serde(default)]
    pub values: Vec<MetricValueModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotModel {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerMetricsResponse {
    pub metrics: ContainerMetricsModel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerMetricsModel {
    #[serde(default)]
    pub values: Vec<MetricValueModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricValueModel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dimensions: HashMap<String, String>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}
