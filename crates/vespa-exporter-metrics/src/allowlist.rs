use std::{collections::HashSet, path::Path, sync::Arc};

use tracing::info;
use vespa_exporter_common::error::Result;

use crate::registry::{GaugeMetric, MetricsRegistry};

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    names: HashSet<String>,
}

impl AllowList {
    pub fn permit_all() -> Self {
        Self::default()
    }

    pub fn parse(contents: &str) -> Self {
        Self::from_names(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let allow_list = Self::parse(&std::fs::read_to_string(path)?);
        info!(
            path = %path.display(),
            metrics = allow_list.len(),
            "loaded metrics allow-list"
        );
        Ok(allow_list)
    }

    pub fn permitted(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Clone)]
pub struct MetricGate {
    registry: Arc<MetricsRegistry>,
    allow_list: Arc<AllowList>,
}

impl MetricGate {
    pub fn new(registry: Arc<MetricsRegistry>, allow_list: Arc<AllowList>) -> Self {
        Self {
            registry,
            allow_list,
        }
    }

    pub fn expose(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Option<Arc<GaugeMetric>>> {
        if !self.allow_list.permitted(name) {
            return Ok(None);
        }
        self.registry.ensure_gauge(name, help, label_names).map(Some)
    }

    pub fn expose_always(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        self.registry.ensure_gauge(name, help, label_names)
    }
}
