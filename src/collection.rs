//! Collection assembly for one domain.
//!
//! Each statistics category reads its raw values through the hypervisor
//! connection and packages them as `(metric name, samples)` entries in a
//! [`MetricCollection`]. Scalar categories (CPU, memory) produce one sample
//! per metric; per-device categories (block, disk, interface) produce one
//! sample per device, each tagged with an extra device label.

use std::time::Duration;
use tracing::debug;

use crate::derivative::DerivativeEngine;
use crate::descriptor::{DeviceKind, DomainDescriptor};
use crate::error::{ExporterError, Result};
use crate::hypervisor::{BlockInfo, Connection, Domain, InterfaceStats};
use crate::labels::{LabelSet, LABEL_TARGET_DISK, LABEL_TARGET_INTERFACE};

/// Divisor applied to cumulative CPU nanoseconds before the rate is taken.
/// Together with the per-second interval this yields percent of one vCPU.
pub const CPU_TIME_SCALE: f64 = 10_000_000.0;

/// One labeled value for a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub labels: LabelSet,
}

impl Sample {
    pub fn new(value: f64, labels: LabelSet) -> Self {
        Self { value, labels }
    }
}

/// Ordered mapping from metric name to the samples produced for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricCollection {
    entries: Vec<(String, Vec<Sample>)>,
}

impl MetricCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample under `metric`, keeping first-seen metric order.
    pub fn push(&mut self, metric: impl Into<String>, sample: Sample) {
        let metric = metric.into();
        match self.entries.iter_mut().find(|(name, _)| *name == metric) {
            Some((_, samples)) => samples.push(sample),
            None => self.entries.push((metric, vec![sample])),
        }
    }

    pub fn extend(&mut self, other: MetricCollection) {
        for (metric, samples) in other.entries {
            for sample in samples {
                self.push(metric.clone(), sample);
            }
        }
    }

    pub fn get(&self, metric: &str) -> Option<&[Sample]> {
        self.entries
            .iter()
            .find(|(name, _)| name == metric)
            .map(|(_, samples)| samples.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Sample])> {
        self.entries
            .iter()
            .map(|(name, samples)| (name.as_str(), samples.as_slice()))
    }

    /// Number of distinct metric names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|(_, samples)| samples.len()).sum()
    }
}

/// Statistics categories collected for every domain, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCategory {
    Cpu,
    Memory,
    Block,
    Interface,
    Disk,
}

impl StatCategory {
    pub const ALL: [StatCategory; 5] = [
        StatCategory::Cpu,
        StatCategory::Memory,
        StatCategory::Block,
        StatCategory::Interface,
        StatCategory::Disk,
    ];

    /// Metric name prefix for the category.
    pub fn prefix(&self) -> &'static str {
        match self {
            StatCategory::Cpu => "libvirt_cpu_stats_",
            StatCategory::Memory => "libvirt_mem_stats_",
            StatCategory::Block => "libvirt_block_stats_",
            StatCategory::Interface => "libvirt_interface_",
            StatCategory::Disk => "libvirt_disk_",
        }
    }

    pub fn metric_name(&self, stat: &str) -> String {
        format!("{}{}", self.prefix(), sanitize_metric_suffix(stat))
    }
}

/// Replaces characters that are not valid in a Prometheus metric name.
fn sanitize_metric_suffix(stat: &str) -> String {
    stat.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Reads and packages the statistics of one domain.
pub struct CollectionAssembler<'a> {
    conn: &'a dyn Connection,
    domain: &'a Domain,
    descriptor: &'a DomainDescriptor,
    labels: &'a LabelSet,
}

impl<'a> CollectionAssembler<'a> {
    pub fn new(
        conn: &'a dyn Connection,
        domain: &'a Domain,
        descriptor: &'a DomainDescriptor,
        labels: &'a LabelSet,
    ) -> Self {
        Self {
            conn,
            domain,
            descriptor,
            labels,
        }
    }

    /// Assembles one category. `derivative` and `interval` are only used by
    /// counter-based categories.
    pub fn assemble(
        &self,
        category: StatCategory,
        derivative: &mut DerivativeEngine,
        interval: Duration,
    ) -> Result<MetricCollection> {
        let collection = match category {
            StatCategory::Cpu => self.cpu(derivative, interval)?,
            StatCategory::Memory => self.memory()?,
            StatCategory::Block => self.block_stats()?,
            StatCategory::Interface => self.interfaces()?,
            StatCategory::Disk => self.disk_capacity()?,
        };

        debug!(
            "Assembled {:?} for domain {}: {} metrics, {} samples",
            category,
            self.domain.uuid,
            collection.len(),
            collection.sample_count()
        );
        Ok(collection)
    }

    /// `cpu_used` (rate of normalized busy time) and `max_cpu`.
    pub fn cpu(
        &self,
        derivative: &mut DerivativeEngine,
        interval: Duration,
    ) -> Result<MetricCollection> {
        let total_ns: f64 = self
            .conn
            .cpu_stats(self.domain)?
            .iter()
            .map(|entry| entry.cpu_time_ns)
            .sum();

        let max_vcpus = self.conn.max_vcpus(self.domain)?;
        if max_vcpus == 0 {
            return Err(ExporterError::parse(
                format!("vCPU count of domain {}", self.domain.uuid),
                "maximum vCPU count is 0",
            ));
        }

        let normalized = total_ns / f64::from(max_vcpus) / CPU_TIME_SCALE;
        let cpu_used = derivative.derive(&self.domain.uuid, normalized, interval, false);

        let mut collection = MetricCollection::new();
        collection.push(
            StatCategory::Cpu.metric_name("cpu_used"),
            Sample::new(cpu_used, self.labels.clone()),
        );
        collection.push(
            StatCategory::Cpu.metric_name("max_cpu"),
            Sample::new(f64::from(max_vcpus), self.labels.clone()),
        );
        Ok(collection)
    }

    /// One sample per reported memory counter.
    pub fn memory(&self) -> Result<MetricCollection> {
        let mut collection = MetricCollection::new();
        for (name, value) in self.conn.memory_stats(self.domain)? {
            collection.push(
                StatCategory::Memory.metric_name(&name),
                Sample::new(value, self.labels.clone()),
            );
        }
        Ok(collection)
    }

    /// Raw cumulative I/O counters per disk.
    pub fn block_stats(&self) -> Result<MetricCollection> {
        let mut collection = MetricCollection::new();
        for target in self.descriptor.targets(DeviceKind::Disk) {
            let labels = self.labels.with(LABEL_TARGET_DISK, target.as_str());
            for (name, value) in self.conn.block_stats(self.domain, target)? {
                collection.push(
                    StatCategory::Block.metric_name(&name),
                    Sample::new(value, labels.clone()),
                );
            }
        }
        Ok(collection)
    }

    /// Capacity, allocation and physical size per disk.
    pub fn disk_capacity(&self) -> Result<MetricCollection> {
        let mut collection = MetricCollection::new();
        for target in self.descriptor.targets(DeviceKind::Disk) {
            let labels = self.labels.with(LABEL_TARGET_DISK, target.as_str());
            let info = self.conn.block_info(self.domain, target)?;
            for (name, value) in BlockInfo::METRIC_NAMES.iter().zip(info.values()) {
                collection.push(
                    StatCategory::Disk.metric_name(name),
                    Sample::new(value, labels.clone()),
                );
            }
        }
        Ok(collection)
    }

    /// Receive/transmit counters per interface.
    pub fn interfaces(&self) -> Result<MetricCollection> {
        let mut collection = MetricCollection::new();
        for target in self.descriptor.targets(DeviceKind::Interface) {
            let labels = self.labels.with(LABEL_TARGET_INTERFACE, target.as_str());
            let stats = self.conn.interface_stats(self.domain, target)?;
            for (name, value) in InterfaceStats::METRIC_NAMES.iter().zip(stats.values()) {
                collection.push(
                    StatCategory::Interface.metric_name(name),
                    Sample::new(value, labels.clone()),
                );
            }
        }
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(domain: &str) -> LabelSet {
        [("domain", domain), ("uuid", "u-1")].into_iter().collect()
    }

    #[test]
    fn test_collection_groups_by_metric() {
        let mut collection = MetricCollection::new();
        collection.push("a", Sample::new(1.0, labels("x")));
        collection.push("b", Sample::new(2.0, labels("x")));
        collection.push("a", Sample::new(3.0, labels("y")));

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.sample_count(), 3);
        assert_eq!(collection.get("a").map(|s| s.len()), Some(2));

        let names: Vec<&str> = collection.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_extend_merges_same_metric() {
        let mut first = MetricCollection::new();
        first.push("libvirt_disk_capacity", Sample::new(1.0, labels("x")));
        let mut second = MetricCollection::new();
        second.push("libvirt_disk_capacity", Sample::new(2.0, labels("y")));

        first.extend(second);
        assert_eq!(first.len(), 1);
        assert_eq!(first.sample_count(), 2);
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            StatCategory::Cpu.metric_name("cpu_used"),
            "libvirt_cpu_stats_cpu_used"
        );
        assert_eq!(
            StatCategory::Interface.metric_name("receive_bytes"),
            "libvirt_interface_receive_bytes"
        );
        assert_eq!(
            StatCategory::Memory.metric_name("hugetlb-pgalloc"),
            "libvirt_mem_stats_hugetlb_pgalloc"
        );
    }
}
