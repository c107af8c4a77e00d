pub mod allowlist;
pub mod names;
pub mod registry;
pub mod types;

pub use allowlist::{AllowList, MetricGate};
pub use registry::{CounterMetric, GaugeMetric, HistogramMetric, MetricsRegistry};
pub use types::{ExportedMetric, MetricDescriptor, MetricKind, Sample, SampleValue};
