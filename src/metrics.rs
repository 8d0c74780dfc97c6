//! Prometheus metrics describing the exporter itself.
//!
//! Domain statistics are registered dynamically by
//! [`MetricRegistry`](crate::registry::MetricRegistry); the metrics here are
//! fixed and registered once at startup in the same Prometheus registry.

use prometheus::{Counter, Gauge, Registry};

/// Self-telemetry updated at the end of every scrape cycle.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub scrape_duration_seconds: Gauge,
    pub domains: Gauge,
    pub last_scrape_success: Gauge,
    pub scrapes_total: Counter,
    pub domain_failures_total: Counter,
    pub schema_mismatches_total: Counter,
}

impl ExporterMetrics {
    /// Creates and registers all exporter metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let scrape_duration_seconds = Gauge::new(
            "libvirt_exporter_scrape_duration_seconds",
            "Time spent in the last scrape cycle (connect, enumerate, collect, record)",
        )?;
        let domains = Gauge::new(
            "libvirt_exporter_domains",
            "Number of running domains found in the last scrape cycle",
        )?;
        let last_scrape_success = Gauge::new(
            "libvirt_exporter_last_scrape_success",
            "Whether every domain was collected in the last scrape cycle (1) or some were skipped (0)",
        )?;
        let scrapes_total = Counter::new(
            "libvirt_exporter_scrapes_total",
            "Total number of completed scrape cycles",
        )?;
        let domain_failures_total = Counter::new(
            "libvirt_exporter_domain_failures_total",
            "Total number of domains whose samples were omitted because collection failed",
        )?;
        let schema_mismatches_total = Counter::new(
            "libvirt_exporter_schema_mismatches_total",
            "Total number of metric batches rejected because their labels did not match the metric schema",
        )?;

        registry.register(Box::new(scrape_duration_seconds.clone()))?;
        registry.register(Box::new(domains.clone()))?;
        registry.register(Box::new(last_scrape_success.clone()))?;
        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(domain_failures_total.clone()))?;
        registry.register(Box::new(schema_mismatches_total.clone()))?;

        Ok(Self {
            scrape_duration_seconds,
            domains,
            last_scrape_success,
            scrapes_total,
            domain_failures_total,
            schema_mismatches_total,
        })
    }
}
