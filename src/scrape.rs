//! Scrape cycle orchestration.
//!
//! One cycle opens a hypervisor connection, enumerates the running domains
//! (busy-polling until at least one shows up), assembles every statistics
//! category for every domain and records the result in the
//! [`MetricRegistry`]. Domains are processed sequentially.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::collection::{CollectionAssembler, MetricCollection, StatCategory};
use crate::derivative::DerivativeEngine;
use crate::descriptor::DomainDescriptor;
use crate::error::{ExporterError, Result};
use crate::health_stats::{CycleReport, ScrapeStats};
use crate::hypervisor::{Connection, Domain, Hypervisor};
use crate::labels::extract_labels;
use crate::metrics::ExporterMetrics;
use crate::registry::MetricRegistry;

/// Blocking pause used between enumeration attempts.
pub type Sleeper = Box<dyn Fn(Duration) + Send>;

/// A unit of work the scheduler runs once per tick.
pub trait Cycle {
    fn run_cycle(&mut self) -> Result<CycleReport>;
}

/// Scrape Cycle Orchestrator for one hypervisor URI.
pub struct ScrapeCycle {
    hypervisor: Box<dyn Hypervisor>,
    uri: String,
    interval: Duration,
    registry: Arc<MetricRegistry>,
    derivative: DerivativeEngine,
    stats: Option<Arc<ScrapeStats>>,
    metrics: Option<ExporterMetrics>,
    sleep: Sleeper,
}

impl ScrapeCycle {
    /// `interval` is both the rate interval for counters and the pause
    /// between empty enumerations.
    pub fn new(
        hypervisor: Box<dyn Hypervisor>,
        uri: impl Into<String>,
        interval: Duration,
        registry: Arc<MetricRegistry>,
    ) -> Self {
        Self {
            hypervisor,
            uri: uri.into(),
            interval,
            registry,
            derivative: DerivativeEngine::new(),
            stats: None,
            metrics: None,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replaces the counter baseline store.
    pub fn with_derivative(mut self, derivative: DerivativeEngine) -> Self {
        self.derivative = derivative;
        self
    }

    pub fn with_stats(mut self, stats: Arc<ScrapeStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn derivative(&self) -> &DerivativeEngine {
        &self.derivative
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Runs one full cycle: connect, enumerate, assemble, record, close.
    ///
    /// Only connection failures are returned; per-domain failures are logged
    /// and counted in the report.
    #[instrument(skip(self), fields(uri = %self.uri))]
    pub fn run(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        info!("Starting scrape cycle");

        let conn = self.hypervisor.open(&self.uri)?;
        let result = self.collect_all(conn.as_ref());

        if let Err(e) = conn.close() {
            warn!("Failed to close connection to {}: {}", self.uri, e);
        }
        let mut report = result?;

        report.duration_seconds = start.elapsed().as_secs_f64();
        self.publish(&report);

        info!(
            "Scrape cycle completed: {} domains ({} skipped), {} samples, {:.2}ms",
            report.domains,
            report.domains_skipped,
            report.samples_recorded,
            report.duration_seconds * 1000.0
        );
        Ok(report)
    }

    /// Enumerates and collects every domain over an open connection. Stops at
    /// the first connection failure.
    fn collect_all(&mut self, conn: &dyn Connection) -> Result<CycleReport> {
        let (domains, enumeration_retries) = self.wait_for_domains(conn)?;

        let mut report = CycleReport {
            domains: domains.len(),
            enumeration_retries,
            ..Default::default()
        };

        for domain in &domains {
            debug!("Collecting domain {}", domain.uuid);
            match self.collect_domain(conn, domain) {
                Ok(collection) => self.record(domain, &collection, &mut report),
                Err(e) if e.is_connection_failure() => return Err(e),
                Err(e) => {
                    warn!("Skipping domain {} for this cycle: {}", domain.uuid, e);
                    report.domains_skipped += 1;
                }
            }
        }
        Ok(report)
    }

    /// Enumerates running domains, sleeping one interval between attempts
    /// until at least one is found. Returns the domains and the number of
    /// empty attempts.
    fn wait_for_domains(&self, conn: &dyn Connection) -> Result<(Vec<Domain>, usize)> {
        let mut retries = 0;
        loop {
            let domains = enumerate_domains(conn)?;
            if !domains.is_empty() {
                return Ok((domains, retries));
            }
            info!(
                "No running domains in {}, retrying in {}s",
                self.uri,
                self.interval.as_secs_f64()
            );
            retries += 1;
            (self.sleep)(self.interval);
        }
    }

    /// Assembles every category for one domain. Nothing is recorded here so
    /// a failing category omits the whole domain.
    fn collect_domain(&mut self, conn: &dyn Connection, domain: &Domain) -> Result<MetricCollection> {
        let xml = conn.describe_domain(domain)?;
        let descriptor = DomainDescriptor::parse(&xml)?;
        let labels = extract_labels(&descriptor, &domain.uuid)?;

        let assembler = CollectionAssembler::new(conn, domain, &descriptor, &labels);
        let mut collection = MetricCollection::new();
        for category in StatCategory::ALL {
            collection.extend(assembler.assemble(category, &mut self.derivative, self.interval)?);
        }
        Ok(collection)
    }

    fn record(&self, domain: &Domain, collection: &MetricCollection, report: &mut CycleReport) {
        for (metric, samples) in collection.iter() {
            match self.registry.record(metric, samples) {
                Ok(count) => report.samples_recorded += count,
                Err(e @ ExporterError::SchemaMismatch { .. }) => {
                    warn!("Rejected samples of domain {}: {}", domain.uuid, e);
                    report.schema_mismatches += 1;
                }
                Err(e) => {
                    warn!("Failed to record {} for domain {}: {}", metric, domain.uuid, e);
                }
            }
        }
    }

    fn publish(&self, report: &CycleReport) {
        if let Some(stats) = &self.stats {
            stats.record_cycle(report);
        }
        if let Some(metrics) = &self.metrics {
            metrics.scrape_duration_seconds.set(report.duration_seconds);
            metrics.domains.set(report.domains as f64);
            metrics
                .last_scrape_success
                .set(if report.domains_skipped == 0 { 1.0 } else { 0.0 });
            metrics.scrapes_total.inc();
            metrics
                .domain_failures_total
                .inc_by(report.domains_skipped as f64);
            metrics
                .schema_mismatches_total
                .inc_by(report.schema_mismatches as f64);
        }
    }
}

impl Cycle for ScrapeCycle {
    fn run_cycle(&mut self) -> Result<CycleReport> {
        self.run()
    }
}

/// Lists running domain IDs and resolves each; vanished domains are skipped.
fn enumerate_domains(conn: &dyn Connection) -> Result<Vec<Domain>> {
    let mut domains = Vec::new();
    for id in conn.list_running_domain_ids()? {
        match conn.lookup_domain(id)? {
            Some(domain) => domains.push(domain),
            None => warn!("Failed to find the domain with id {}", id),
        }
    }
    Ok(domains)
}
