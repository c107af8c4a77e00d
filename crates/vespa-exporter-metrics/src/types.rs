#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    pub(crate) fn new(name: &str, help: &str, kind: MetricKind, label_names: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|label| (*label).to_string()).collect(),
        }
    }

    pub fn has_label_set(&self, label_names: &[&str]) -> bool {
        self.label_names.len() == label_names.len()
            && label_names
                .iter()
                .all(|label| self.label_names.iter().any(|known| known == *label))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Counter(f64),
    Gauge(f64),
    Histogram {
        buckets: Vec<(f64, u64)>,
        count: u64,
        sum: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: SampleValue,
}

#[derive(Debug, Clone)]
pub struct ExportedMetric {
    pub descriptor: MetricDescriptor,
    pub samples: Vec<Sample>,
}
