//! Hypervisor connection interface.
//!
//! The scrape pipeline only talks to the hypervisor daemon through the
//! [`Hypervisor`] and [`Connection`] traits. The production backend drives
//! the `virsh` client; tests substitute an in-memory fake.

pub mod virsh;

pub use virsh::VirshHypervisor;

use crate::error::Result;

/// A running domain as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Runtime ID assigned by the daemon; only valid while the domain runs.
    pub id: u32,
    /// Stable identifier.
    pub uuid: String,
}

/// Cumulative CPU time of one CPU statistics entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuTimes {
    /// Busy time in nanoseconds.
    pub cpu_time_ns: f64,
}

/// Size counters of one block device, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockInfo {
    pub capacity: f64,
    pub allocation: f64,
    pub physical: f64,
}

impl BlockInfo {
    pub const METRIC_NAMES: [&'static str; 3] = ["capacity", "allocation", "physical"];

    /// Values in the order of [`BlockInfo::METRIC_NAMES`].
    pub fn values(&self) -> [f64; 3] {
        [self.capacity, self.allocation, self.physical]
    }
}

/// Receive/transmit counters of one network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InterfaceStats {
    pub receive_bytes: f64,
    pub receive_packets: f64,
    pub receive_errors: f64,
    pub receive_drops: f64,
    pub transmit_bytes: f64,
    pub transmit_packets: f64,
    pub transmit_errors: f64,
    pub transmit_drops: f64,
}

impl InterfaceStats {
    pub const METRIC_NAMES: [&'static str; 8] = [
        "receive_bytes",
        "receive_packets",
        "receive_errors",
        "receive_drops",
        "transmit_bytes",
        "transmit_packets",
        "transmit_errors",
        "transmit_drops",
    ];

    /// Values in the order of [`InterfaceStats::METRIC_NAMES`].
    pub fn values(&self) -> [f64; 8] {
        [
            self.receive_bytes,
            self.receive_packets,
            self.receive_errors,
            self.receive_drops,
            self.transmit_bytes,
            self.transmit_packets,
            self.transmit_errors,
            self.transmit_drops,
        ]
    }
}

/// Opens connections to a hypervisor daemon.
pub trait Hypervisor: Send {
    fn open(&self, uri: &str) -> Result<Box<dyn Connection>>;
}

/// An open connection and the per-domain statistics accessors.
pub trait Connection {
    /// IDs of all running domains. Failure here is a connection failure.
    fn list_running_domain_ids(&self) -> Result<Vec<u32>>;

    /// Resolves an ID; `None` when the domain vanished since enumeration.
    fn lookup_domain(&self, id: u32) -> Result<Option<Domain>>;

    /// The domain's XML descriptor.
    fn describe_domain(&self, domain: &Domain) -> Result<String>;

    fn cpu_stats(&self, domain: &Domain) -> Result<Vec<CpuTimes>>;

    fn max_vcpus(&self, domain: &Domain) -> Result<u32>;

    /// Named memory counters in the order reported by the daemon.
    fn memory_stats(&self, domain: &Domain) -> Result<Vec<(String, f64)>>;

    /// Named live I/O counters of one block device.
    fn block_stats(&self, domain: &Domain, target: &str) -> Result<Vec<(String, f64)>>;

    fn block_info(&self, domain: &Domain, target: &str) -> Result<BlockInfo>;

    fn interface_stats(&self, domain: &Domain, target: &str) -> Result<InterfaceStats>;

    fn close(self: Box<Self>) -> Result<()>;
}
