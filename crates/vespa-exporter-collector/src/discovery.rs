use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use url::Url;
use vespa_exporter_common::error::{ExporterError, Result};

use crate::{
    config::ExporterConfig,
    http::get_json,
    types::{ClusterModel, Topology},
};

#[derive(Debug, Clone)]
pub struct TopologyRefresh {
    pub topology: Arc<Topology>,
    pub stale: bool,
}

#[derive(Clone)]
pub struct TopologyDiscovery {
    model_url: Url,
    client: reqwest::Client,
    current: Arc<RwLock<Option<Arc<Topology>>>>,
}

impl TopologyDiscovery {
    pub fn new(config: &ExporterConfig) -> Result<Self> {
        Ok(Self {
            model_url: config.model_url()?,
            client: config.http_client()?,
            current: Arc::new(RwLock::new(None)),
        })
    }

    pub fn model_url(&self) -> &Url {
        &self.model_url
    }

    pub fn current(&self) -> Option<Arc<Topology>> {
        self.current.read().ok()?.clone()
    }

    pub async fn refresh(&self) -> Result<TopologyRefresh> {
        match self.fetch().await {
            Ok(topology) => {
                let topology = Arc::new(topology);
                self.replace(Arc::clone(&topology))?;
                Ok(TopologyRefresh {
                    topology,
                    stale: false,
                })
            }
            Err(err) => {
                error!(
                    config_server = %self.model_url,
                    error = %err,
                    "could not update topology from config server"
                );
                match self.current() {
                    Some(topology) => {
                        warn!(
                            refreshed_at = %topology.refreshed_at(),
                            "collecting with last known topology"
                        );
                        Ok(TopologyRefresh {
                            topology,
                            stale: true,
                        })
                    }
                    None => Err(ExporterError::NoTopology),
                }
            }
        }
    }

    async fn fetch(&self) -> Result<Topology> {
        let model: ClusterModel = get_json(&self.client, &self.model_url).await?;
        let topology = Topology::from_model(&model, Utc::now());
        debug!(
            hosts = model.hosts.len(),
            endpoints = topology.total_endpoints(),
            "fetched cluster model"
        );
        Ok(topology)
    }

    fn replace(&self, topology: Arc<Topology>) -> Result<()> {
        let mut current = self
            .current
            .write()
            .map_err(|_| ExporterError::InternalError("topology lock poisoned".to_string()))?;

        let changed = current
            .as_ref()
            .is_none_or(|previous| !previous.same_endpoints(&topology));
        if changed {
            info!(
                endpoints = topology.total_endpoints(),
                services = ?topology.to_host_ports(),
                "cluster topology changed"
            );
        }

        *current = Some(topology);
        Ok(())
    }
}
