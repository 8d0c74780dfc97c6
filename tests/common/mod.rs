//! In-memory hypervisor shared by the integration tests.
//!
//! The fake serves scripted domains; tests keep a handle to the shared state
//! so they can change counters or enumeration results between cycles.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use libvirt_exporter::hypervisor::{BlockInfo, Connection, CpuTimes, Domain, Hypervisor, InterfaceStats};
use libvirt_exporter::{ExporterError, Result};

pub const TEST_URI: &str = "test:///default";

#[derive(Debug, Clone, Default)]
pub struct FakeDomain {
    pub id: u32,
    pub uuid: String,
    pub xml: String,
    pub cpu_ns: Vec<f64>,
    pub max_vcpus: u32,
    pub memory: Vec<(String, f64)>,
    pub block_stats: HashMap<String, Vec<(String, f64)>>,
    pub block_info: HashMap<String, BlockInfo>,
    pub interfaces: HashMap<String, InterfaceStats>,
    /// Makes every statistics call of this domain fail.
    pub broken: bool,
}

impl FakeDomain {
    pub fn new(id: u32, uuid: &str, xml: String) -> Self {
        Self {
            id,
            uuid: uuid.to_string(),
            xml,
            cpu_ns: vec![0.0],
            max_vcpus: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub domains: Vec<FakeDomain>,
    /// Scripted results of `list_running_domain_ids`; once exhausted the
    /// IDs of all configured domains are returned.
    pub scripted_ids: VecDeque<Vec<u32>>,
    pub enumerations: usize,
    pub opens: usize,
    pub closes: usize,
    pub refuse_connections: bool,
    /// Makes `list_running_domain_ids` report a lost connection.
    pub drop_on_enumeration: bool,
}

impl FakeState {
    fn domain(&self, uuid: &str) -> Result<&FakeDomain> {
        let domain = self
            .domains
            .iter()
            .find(|d| d.uuid == uuid)
            .ok_or_else(|| command_error("lookup", uuid, "domain not found"))?;
        if domain.broken {
            return Err(command_error("stats", uuid, "domain is not running"));
        }
        Ok(domain)
    }
}

fn command_error(command: &str, uuid: &str, reason: &str) -> ExporterError {
    ExporterError::Command {
        command: format!("{} {}", command, uuid),
        reason: reason.to_string(),
    }
}

#[derive(Clone, Default)]
pub struct FakeHypervisor {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeHypervisor {
    pub fn with_domains(domains: Vec<FakeDomain>) -> Self {
        let hypervisor = Self::default();
        hypervisor.state.lock().unwrap().domains = domains;
        hypervisor
    }

    pub fn update_domain(&self, uuid: &str, f: impl FnOnce(&mut FakeDomain)) {
        let mut state = self.state.lock().unwrap();
        let domain = state.domains.iter_mut().find(|d| d.uuid == uuid).unwrap();
        f(domain);
    }
}

impl Hypervisor for FakeHypervisor {
    fn open(&self, uri: &str) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(ExporterError::Connection {
                uri: uri.to_string(),
                reason: "connection refused".into(),
            });
        }
        state.opens += 1;
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl Connection for FakeConnection {
    fn list_running_domain_ids(&self) -> Result<Vec<u32>> {
        let mut state = self.state.lock().unwrap();
        state.enumerations += 1;
        if state.drop_on_enumeration {
            return Err(ExporterError::Connection {
                uri: TEST_URI.to_string(),
                reason: "daemon went away".into(),
            });
        }
        match state.scripted_ids.pop_front() {
            Some(ids) => Ok(ids),
            None => Ok(state.domains.iter().map(|d| d.id).collect()),
        }
    }

    fn lookup_domain(&self, id: u32) -> Result<Option<Domain>> {
        let state = self.state.lock().unwrap();
        Ok(state.domains.iter().find(|d| d.id == id).map(|d| Domain {
            id: d.id,
            uuid: d.uuid.clone(),
        }))
    }

    fn describe_domain(&self, domain: &Domain) -> Result<String> {
        let state = self.state.lock().unwrap();
        let fake = state
            .domains
            .iter()
            .find(|d| d.uuid == domain.uuid)
            .ok_or_else(|| command_error("dumpxml", &domain.uuid, "domain not found"))?;
        Ok(fake.xml.clone())
    }

    fn cpu_stats(&self, domain: &Domain) -> Result<Vec<CpuTimes>> {
        let state = self.state.lock().unwrap();
        let fake = state.domain(&domain.uuid)?;
        Ok(fake
            .cpu_ns
            .iter()
            .map(|&cpu_time_ns| CpuTimes { cpu_time_ns })
            .collect())
    }

    fn max_vcpus(&self, domain: &Domain) -> Result<u32> {
        let state = self.state.lock().unwrap();
        Ok(state.domain(&domain.uuid)?.max_vcpus)
    }

    fn memory_stats(&self, domain: &Domain) -> Result<Vec<(String, f64)>> {
        let state = self.state.lock().unwrap();
        Ok(state.domain(&domain.uuid)?.memory.clone())
    }

    fn block_stats(&self, domain: &Domain, target: &str) -> Result<Vec<(String, f64)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .domain(&domain.uuid)?
            .block_stats
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    fn block_info(&self, domain: &Domain, target: &str) -> Result<BlockInfo> {
        let state = self.state.lock().unwrap();
        state
            .domain(&domain.uuid)?
            .block_info
            .get(target)
            .copied()
            .ok_or_else(|| command_error("domblkinfo", target, "no such disk"))
    }

    fn interface_stats(&self, domain: &Domain, target: &str) -> Result<InterfaceStats> {
        let state = self.state.lock().unwrap();
        state
            .domain(&domain.uuid)?
            .interfaces
            .get(target)
            .copied()
            .ok_or_else(|| command_error("domifstat", target, "no such interface"))
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Descriptor of a domain managed by OpenStack Nova.
pub fn nova_xml(name: &str, instance: &str, project: &str, disks: &[&str], interfaces: &[&str]) -> String {
    format!(
        r#"<domain type="kvm">
  <name>{name}</name>
  <metadata>
    <nova:instance xmlns:nova="http://openstack.org/xmlns/libvirt/nova/1.0">
      <nova:name>{instance}</nova:name>
      <nova:owner>
        <nova:user uuid="e1">admin</nova:user>
        <nova:project uuid="p1">{project}</nova:project>
      </nova:owner>
    </nova:instance>
  </metadata>
  {devices}
</domain>"#,
        devices = devices(disks, interfaces)
    )
}

/// Descriptor of a domain without orchestration metadata.
pub fn bare_xml(name: &str, disks: &[&str], interfaces: &[&str]) -> String {
    format!(
        "<domain type=\"kvm\">\n  <name>{name}</name>\n  {}\n</domain>",
        devices(disks, interfaces)
    )
}

fn devices(disks: &[&str], interfaces: &[&str]) -> String {
    let mut out = String::from("<devices>");
    for disk in disks {
        out.push_str(&format!(
            "<disk type=\"file\" device=\"disk\"><source file=\"/var/lib/libvirt/images/{disk}.qcow2\"/><target dev=\"{disk}\" bus=\"virtio\"/></disk>"
        ));
    }
    for iface in interfaces {
        out.push_str(&format!(
            "<interface type=\"bridge\"><target dev=\"{iface}\"/><model type=\"virtio\"/></interface>"
        ));
    }
    out.push_str("</devices>");
    out
}
