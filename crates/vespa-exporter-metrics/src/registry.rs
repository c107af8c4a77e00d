use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use vespa_exporter_common::error::{ExporterError, Result};

use crate::types::{ExportedMetric, MetricDescriptor, MetricKind, Sample, SampleValue};

type LabelValues = Vec<String>;

#[derive(Clone)]
enum MetricHandle {
    Counter(Arc<CounterMetric>),
    Gauge(Arc<GaugeMetric>),
    Histogram(Arc<HistogramMetric>),
}

impl MetricHandle {
    fn descriptor(&self) -> &MetricDescriptor {
        match self {
            Self::Counter(metric) => &metric.descriptor,
            Self::Gauge(metric) => &metric.descriptor,
            Self::Histogram(metric) => &metric.descriptor,
        }
    }

    fn export(&self) -> ExportedMetric {
        let samples = match self {
            Self::Counter(metric) => metric.samples(),
            Self::Gauge(metric) => metric.samples(),
            Self::Histogram(metric) => metric.samples(),
        };
        ExportedMetric {
            descriptor: self.descriptor().clone(),
            samples,
        }
    }
}

pub struct MetricsRegistry {
    metrics: RwLock<HashMap<String, MetricHandle>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<CounterMetric>> {
        let metric = Arc::new(CounterMetric::new(name, help, label_names));
        self.register(MetricHandle::Counter(Arc::clone(&metric)))?;
        Ok(metric)
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        let metric = Arc::new(GaugeMetric::new(name, help, label_names));
        self.register(MetricHandle::Gauge(Arc::clone(&metric)))?;
        Ok(metric)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<Arc<HistogramMetric>> {
        let metric = Arc::new(HistogramMetric::new(name, help, label_names, buckets));
        self.register(MetricHandle::Histogram(Arc::clone(&metric)))?;
        Ok(metric)
    }

    pub fn ensure_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<Arc<GaugeMetric>> {
        {
            let metrics = self.read_metrics()?;
            if let Some(existing) = metrics.get(name) {
                return existing_gauge(existing, label_names);
            }
        }

        let mut metrics = self.write_metrics()?;
        if let Some(existing) = metrics.get(name) {
            return existing_gauge(existing, label_names);
        }

        let metric = Arc::new(GaugeMetric::new(name, help, label_names));
        metrics.insert(name.to_string(), MetricHandle::Gauge(Arc::clone(&metric)));
        Ok(metric)
    }

    pub fn gauge(&self, name: &str) -> Option<Arc<GaugeMetric>> {
        match self.read_metrics().ok()?.get(name) {
            Some(MetricHandle::Gauge(metric)) => Some(Arc::clone(metric)),
            _ => None,
        }
    }

    pub fn set(&self, name: &str, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let gauge = self.gauge(name).ok_or_else(|| {
            ExporterError::InvalidArgument(format!("gauge not registered: {name}"))
        })?;
        gauge.set(labels, value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_metrics()
            .map(|metrics| metrics.contains_key(name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.read_metrics().map(|metrics| metrics.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_for_export(&self) -> Vec<ExportedMetric> {
        let handles = match self.read_metrics() {
            Ok(metrics) => metrics.values().cloned().collect::<Vec<_>>(),
            Err(_) => return Vec::new(),
        };

        let mut exported = handles.iter().map(MetricHandle::export).collect::<Vec<_>>();
        exported.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        exported
    }

    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for metric in self.snapshot_for_export() {
            let name = &metric.descriptor.name;
            output.push_str(&format!(
                "# HELP {name} {}\n",
                escape_help(&metric.descriptor.help)
            ));
            output.push_str(&format!(
                "# TYPE {name} {}\n",
                metric.descriptor.kind.as_prometheus_type()
            ));

            for sample in metric.samples {
                match sample.value {
                    SampleValue::Counter(value) | SampleValue::Gauge(value) => {
                        output.push_str(&render_sample_line(name, &sample.labels, value));
                    }
                    SampleValue::Histogram {
                        buckets,
                        count,
                        sum,
                    } => {
                        let mut cumulative = 0_u64;
                        for (bound, bucket_count) in buckets {
                            cumulative = cumulative.saturating_add(bucket_count);
                            let mut labels = sample.labels.clone();
                            labels.push(("le".to_string(), format_value(bound)));
                            output.push_str(&render_sample_line(
                                &format!("{name}_bucket"),
                                &labels,
                                cumulative as f64,
                            ));
                        }
                        output.push_str(&render_sample_line(
                            &format!("{name}_sum"),
                            &sample.labels,
                            sum,
                        ));
                        output.push_str(&render_sample_line(
                            &format!("{name}_count"),
                            &sample.labels,
                            count as f64,
                        ));
                    }
                }
            }
        }

        output
    }

    fn register(&self, handle: MetricHandle) -> Result<()> {
        let name = handle.descriptor().name.clone();
        let mut metrics = self.write_metrics()?;
        if metrics.contains_key(&name) {
            return Err(ExporterError::AlreadyRegistered(name));
        }
        metrics.insert(name, handle);
        Ok(())
    }

    fn read_metrics(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, MetricHandle>>> {
        self.metrics
            .read()
            .map_err(|_| ExporterError::InternalError("metrics registry lock poisoned".to_string()))
    }

    fn write_metrics(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, MetricHandle>>> {
        self.metrics
            .write()
            .map_err(|_| ExporterError::InternalError("metrics registry lock poisoned".to_string()))
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn existing_gauge(existing: &MetricHandle, label_names: &[&str]) -> Result<Arc<GaugeMetric>> {
    match existing {
        MetricHandle::Gauge(metric) if metric.descriptor.has_label_set(label_names) => {
            Ok(Arc::clone(metric))
        }
        other => Err(ExporterError::RegistrationConflict {
            name: other.descriptor().name.clone(),
            registered: other.descriptor().label_names.clone(),
            observed: label_names.iter().map(|label| (*label).to_string()).collect(),
        }),
    }
}

#[derive(Debug)]
struct SeriesMap<T> {
    series: RwLock<HashMap<LabelValues, Arc<T>>>,
}

impl<T> SeriesMap<T> {
    fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_insert_with(&self, key: LabelValues, create: impl FnOnce() -> T) -> Result<Arc<T>> {
        if let Ok(guard) = self.series.read()
            && let Some(existing) = guard.get(&key)
        {
            return Ok(Arc::clone(existing));
        }

        let mut guard = self
            .series
            .write()
            .map_err(|_| ExporterError::InternalError("metric series lock poisoned".to_string()))?;
        Ok(Arc::clone(
            guard.entry(key).or_insert_with(|| Arc::new(create())),
        ))
    }

    fn get(&self, key: &[String]) -> Option<Arc<T>> {
        self.series.read().ok()?.get(key).cloned()
    }

    fn entries(&self) -> Vec<(LabelValues, Arc<T>)> {
        match self.series.read() {
            Ok(guard) => guard
                .iter()
                .map(|(labels, value)| (labels.clone(), Arc::clone(value)))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct GaugeMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap<AtomicU64>,
}

impl GaugeMetric {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Self {
        Self {
            descriptor: MetricDescriptor::new(name, help, MetricKind::Gauge, label_names),
            series: SeriesMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    pub fn set(&self, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let key = resolve_labels(&self.descriptor, labels)?;
        let cell = self.series.get_or_insert_with(key, || AtomicU64::new(0))?;
        cell.store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        let key = resolve_labels(&self.descriptor, labels).ok()?;
        self.series
            .get(&key)
            .map(|cell| f64::from_bits(cell.load(Ordering::Relaxed)))
    }

    fn samples(&self) -> Vec<Sample> {
        self.series
            .entries()
            .into_iter()
            .map(|(values, cell)| Sample {
                labels: materialize_labels(&self.descriptor, &values),
                value: SampleValue::Gauge(f64::from_bits(cell.load(Ordering::Relaxed))),
            })
            .collect()
    }
}

pub struct CounterMetric {
    descriptor: MetricDescriptor,
    series: SeriesMap<AtomicU64>,
}

impl CounterMetric {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Self {
        Self {
            descriptor: MetricDescriptor::new(name, help, MetricKind::Counter, label_names),
            series: SeriesMap::new(),
        }
    }

    pub fn inc(&self, labels: &[(&str, &str)], value: u64) -> Result<()> {
        let key = resolve_labels(&self.descriptor, labels)?;
        let cell = self.series.get_or_insert_with(key, || AtomicU64::new(0))?;
        cell.fetch_add(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn inc_one(&self, labels: &[(&str, &str)]) -> Result<()> {
        self.inc(labels, 1)
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        resolve_labels(&self.descriptor, labels)
            .ok()
            .and_then(|key| self.series.get(&key))
            .map(|cell| cell.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn samples(&self) -> Vec<Sample> {
        self.series
            .entries()
            .into_iter()
            .map(|(values, cell)| Sample {
                labels: materialize_labels(&self.descriptor, &values),
                value: SampleValue::Counter(cell.load(Ordering::Relaxed) as f64),
            })
            .collect()
    }
}

pub struct HistogramMetric {
    descriptor: MetricDescriptor,
    bounds: Vec<f64>,
    series: SeriesMap<HistogramCells>,
}

struct HistogramCells {
    // One slot per bound plus the +Inf overflow slot.
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_bits: AtomicU64,
}

impl HistogramCells {
    fn new(bounds: usize) -> Self {
        Self {
            buckets: (0..=bounds).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0_f64.to_bits()),
        }
    }
}

impl HistogramMetric {
    fn new(name: &str, help: &str, label_names: &[&str], bounds: &[f64]) -> Self {
        let mut bounds = bounds.to_vec();
        bounds.sort_by(|left, right| left.total_cmp(right));
        bounds.dedup();

        Self {
            descriptor: MetricDescriptor::new(name, help, MetricKind::Histogram, label_names),
            bounds,
            series: SeriesMap::new(),
        }
    }

    pub fn observe(&self, labels: &[(&str, &str)], value: f64) -> Result<()> {
        let key = resolve_labels(&self.descriptor, labels)?;
        let bucket_count = self.bounds.len();
        let cells = self
            .series
            .get_or_insert_with(key, || HistogramCells::new(bucket_count))?;

        let index = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(bucket_count);
        cells.buckets[index].fetch_add(1, Ordering::Relaxed);
        cells.count.fetch_add(1, Ordering::Relaxed);
        let _ = cells
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        Ok(())
    }

    fn samples(&self) -> Vec<Sample> {
        self.series
            .entries()
            .into_iter()
            .map(|(values, cells)| {
                let buckets = self
                    .bounds
                    .iter()
                    .copied()
                    .chain(std::iter::once(f64::INFINITY))
                    .zip(cells.buckets.iter())
                    .map(|(bound, slot)| (bound, slot.load(Ordering::Relaxed)))
                    .collect();

                Sample {
                    labels: materialize_labels(&self.descriptor, &values),
                    value: SampleValue::Histogram {
                        buckets,
                        count: cells.count.load(Ordering::Relaxed),
                        sum: f64::from_bits(cells.sum_bits.load(Ordering::Relaxed)),
                    },
                }
            })
            .collect()
    }
}

fn resolve_labels(descriptor: &MetricDescriptor, labels: &[(&str, &str)]) -> Result<LabelValues> {
    let mismatch = || ExporterError::LabelMismatch {
        name: descriptor.name.clone(),
        expected: descriptor.label_names.clone(),
        provided: labels.iter().map(|(name, _)| (*name).to_string()).collect(),
    };

    if labels.len() != descriptor.label_names.len() {
        return Err(mismatch());
    }

    descriptor
        .label_names
        .iter()
        .map(|expected| {
            let mut matching = labels.iter().filter(|(name, _)| *name == expected.as_str());
            match (matching.next(), matching.next()) {
                (Some((_, value)), None) => Ok((*value).to_string()),
                _ => Err(mismatch()),
            }
        })
        .collect()
}

fn materialize_labels(descriptor: &MetricDescriptor, values: &[String]) -> Vec<(String, String)> {
    descriptor
        .label_names
        .iter()
        .cloned()
        .zip(values.iter().cloned())
        .collect()
}

fn render_sample_line(name: &str, labels: &[(String, String)], value: f64) -> String {
    let mut rendered = String::from(name);

    if !labels.is_empty() {
        let pairs = labels
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", escape_label_value(value)))
            .collect::<Vec<_>>();
        rendered.push('{');
        rendered.push_str(&pairs.join(","));
        rendered.push('}');
    }

    rendered.push(' ');
    rendered.push_str(&format_value(value));
    rendered.push('\n');
    rendered
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
