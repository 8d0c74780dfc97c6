//! Metric registry for domain statistics.
//!
//! Maps metric names to Prometheus gauge vectors. A gauge vector is created
//! the first time a metric name is recorded, with its label schema taken
//! from the first sample; afterwards every record only sets values. Series
//! that stop being reported keep their last value until restart.

use ahash::AHashMap as HashMap;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::collection::Sample;
use crate::error::{ExporterError, Result};
use crate::labels::LabelSet;

/// One exported metric: its immutable label schema, gauge vector and the
/// latest value per label-value combination.
struct ExportedSeries {
    schema: Vec<String>,
    gauge: GaugeVec,
    values: HashMap<Vec<String>, f64>,
}

/// Shared between the scheduler (writer) and the HTTP exposition (reader).
pub struct MetricRegistry {
    registry: Registry,
    series: Mutex<HashMap<String, ExportedSeries>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Wraps an existing Prometheus registry, e.g. one that also carries the
    /// exporter's own metrics.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Creates or updates `metric` with `samples`.
    ///
    /// Every sample must carry exactly the label keys of the metric's schema
    /// (in any order). If any sample does not, nothing in the batch is
    /// written and [`ExporterError::SchemaMismatch`] is returned.
    /// Returns the number of values set.
    pub fn record(&self, metric: &str, samples: &[Sample]) -> Result<usize> {
        let Some(first) = samples.first() else {
            return Ok(0);
        };

        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);

        let schema: Vec<String> = match series.get(metric) {
            Some(existing) => existing.schema.clone(),
            None => first.labels.keys().map(str::to_string).collect(),
        };

        let mut rows: Vec<Vec<&str>> = Vec::with_capacity(samples.len());
        for sample in samples {
            rows.push(ordered_values(metric, &schema, &sample.labels)?);
        }

        if !series.contains_key(metric) {
            let label_names: Vec<&str> = schema.iter().map(String::as_str).collect();
            let gauge = GaugeVec::new(Opts::new(metric, help_text(metric)), &label_names)?;
            self.registry.register(Box::new(gauge.clone()))?;
            debug!("Registered metric {} with labels {:?}", metric, schema);
            series.insert(
                metric.to_string(),
                ExportedSeries {
                    schema: schema.clone(),
                    gauge,
                    values: HashMap::new(),
                },
            );
        }

        let Some(entry) = series.get_mut(metric) else {
            return Ok(0);
        };
        for (sample, values) in samples.iter().zip(&rows) {
            entry
                .gauge
                .get_metric_with_label_values(values)?
                .set(sample.value);
            entry.values.insert(
                values.iter().map(|v| v.to_string()).collect(),
                sample.value,
            );
        }

        Ok(samples.len())
    }

    /// Label schema of a registered metric.
    pub fn schema(&self, metric: &str) -> Option<Vec<String>> {
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(metric).map(|s| s.schema.clone())
    }

    /// Current value of one series, matching labels by name.
    pub fn value(&self, metric: &str, labels: &LabelSet) -> Option<f64> {
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = series.get(metric)?;
        let key: Vec<String> = ordered_values(metric, &entry.schema, labels)
            .ok()?
            .into_iter()
            .map(str::to_string)
            .collect();
        entry.values.get(&key).copied()
    }

    /// Number of label-value combinations stored for `metric`.
    pub fn series_count(&self, metric: &str) -> usize {
        let series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        series.get(metric).map(|entry| entry.values.len()).unwrap_or(0)
    }

    /// Number of registered metric names.
    pub fn metric_count(&self) -> usize {
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Renders the whole Prometheus registry in text exposition format.
    pub fn encode_text(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ExporterError::parse("encoded metrics", e.to_string()))
    }
}

/// Label values of `labels` arranged in schema order.
fn ordered_values<'a>(metric: &str, schema: &[String], labels: &'a LabelSet) -> Result<Vec<&'a str>> {
    let mismatch = || ExporterError::SchemaMismatch {
        metric: metric.to_string(),
        expected: schema.join(", "),
        found: labels.keys().collect::<Vec<_>>().join(", "),
    };

    if labels.len() != schema.len() {
        return Err(mismatch());
    }
    schema
        .iter()
        .map(|name| labels.get(name).ok_or_else(mismatch))
        .collect()
}

fn help_text(metric: &str) -> String {
    format!("libvirt domain statistic {}", metric)
}
