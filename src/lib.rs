//! libvirt Domain Statistics Exporter Library
//!
//! Periodically connects to a libvirt hypervisor, walks every running
//! domain and turns its CPU, memory, block device and network interface
//! statistics into Prometheus gauges. The HTTP server in the binary only
//! reads the resulting registry.
//!
//! # Features
//!
//! - **Hypervisor seam**: [`Hypervisor`]/[`Connection`] traits with a `virsh`
//!   backed implementation
//! - **Identity labels**: OpenStack Nova metadata is preferred over the bare
//!   domain name when present
//! - **Counter rates**: cumulative counters become per-second rates via the
//!   [`DerivativeEngine`]
//! - **Stable schemas**: a metric's label set is fixed on first sight and
//!   mismatching batches are rejected
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use libvirt_exporter::{MetricRegistry, SchedulePolicy, ScrapeCycle, Scheduler, VirshHypervisor};
//!
//! let registry = Arc::new(MetricRegistry::new());
//! let cycle = ScrapeCycle::new(
//!     Box::new(VirshHypervisor::default()),
//!     "qemu:///system",
//!     Duration::from_secs(5),
//!     registry.clone(),
//! );
//!
//! // Blocks until the hypervisor connection is lost.
//! let result = Scheduler::new(cycle, Duration::from_secs(5), SchedulePolicy::AfterCompletion).run();
//! if let Err(e) = result {
//!     eprintln!("exporter stopped: {}", e);
//! }
//! ```

pub mod collection;
pub mod derivative;
pub mod descriptor;
pub mod error;
pub mod health_stats;
pub mod hypervisor;
pub mod labels;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod scrape;

// Re-export main types for convenience
pub use collection::{MetricCollection, Sample, StatCategory};
pub use derivative::DerivativeEngine;
pub use descriptor::DomainDescriptor;
pub use error::{ExporterError, Result};
pub use health_stats::{CycleReport, ScrapeStats};
pub use hypervisor::{Connection, Domain, Hypervisor, VirshHypervisor};
pub use labels::{extract_labels, LabelSet};
pub use metrics::ExporterMetrics;
pub use registry::MetricRegistry;
pub use scheduler::{SchedulePolicy, Scheduler};
pub use scrape::{Cycle, ScrapeCycle};
