pub mod collectors;
pub mod config;
pub mod cycle;
pub mod discovery;
mod http;
pub mod self_metrics;
pub mod types;

#[cfg(test)]
mod test_support;

pub use collectors::{ContainerCollector, EndpointCollector, StandardServiceCollector};
pub use config::ExporterConfig;
pub use cycle::CollectionCycle;
pub use discovery::{TopologyDiscovery, TopologyRefresh};
pub use self_metrics::ExporterMetrics;
pub use types::{Endpoint, Topology};
