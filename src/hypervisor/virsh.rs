//! `virsh` backed hypervisor connection.
//!
//! Every accessor runs one `virsh -c <uri> ...` command and parses its
//! plain-text output. The parsers are pure functions so they can be tested
//! against captured output.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::{BlockInfo, Connection, CpuTimes, Domain, Hypervisor, InterfaceStats};
use crate::error::{ExporterError, Result};

/// Default client binary, resolved through `PATH`.
pub const DEFAULT_VIRSH_BINARY: &str = "virsh";

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Opens [`VirshConnection`]s using the given client binary.
///
/// Each statistic costs one `virsh` child process. A native libvirt binding
/// (e.g. the `virt` crate) plugs in as another [`Connection`] implementation.
#[derive(Debug, Clone)]
pub struct VirshHypervisor {
    binary: PathBuf,
}

impl VirshHypervisor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for VirshHypervisor {
    fn default() -> Self {
        Self::new(DEFAULT_VIRSH_BINARY)
    }
}

impl Hypervisor for VirshHypervisor {
    fn open(&self, uri: &str) -> Result<Box<dyn Connection>> {
        let connection = VirshConnection {
            binary: self.binary.clone(),
            uri: uri.to_string(),
        };

        // `virsh uri` fails unless the daemon accepts the connection.
        let canonical = connection.run(&["uri"]).map_err(|e| ExporterError::Connection {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        info!("Successfully connected to {}", canonical.trim());

        Ok(Box::new(connection))
    }
}

/// Connection state for the `virsh` backend: the target URI.
#[derive(Debug)]
pub struct VirshConnection {
    binary: PathBuf,
    uri: String,
}

impl VirshConnection {
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!("Running {} -c {} {}", self.binary.display(), self.uri, args.join(" "));

        // Parsers match the untranslated field labels.
        let output = Command::new(&self.binary)
            .env("LC_ALL", "C")
            .arg("-c")
            .arg(&self.uri)
            .args(args)
            .output()
            .map_err(|e| ExporterError::Command {
                command: command_line(&self.binary, args),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ExporterError::Command {
                command: command_line(&self.binary, args),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn command_line(binary: &Path, args: &[&str]) -> String {
    format!("{} {}", binary.display(), args.join(" "))
}

impl Connection for VirshConnection {
    fn list_running_domain_ids(&self) -> Result<Vec<u32>> {
        let output = self
            .run(&["list", "--id"])
            .map_err(|e| ExporterError::Connection {
                uri: self.uri.clone(),
                reason: e.to_string(),
            })?;
        parse_domain_ids(&output)
    }

    fn lookup_domain(&self, id: u32) -> Result<Option<Domain>> {
        let id_arg = id.to_string();
        match self.run(&["domuuid", &id_arg]) {
            Ok(output) => {
                let uuid = output.trim();
                if uuid.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Domain {
                    id,
                    uuid: uuid.to_string(),
                }))
            }
            // The domain stopped between `list` and `domuuid`.
            Err(ExporterError::Command { reason, .. }) => {
                debug!("Domain {} not found: {}", id, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn describe_domain(&self, domain: &Domain) -> Result<String> {
        self.run(&["dumpxml", &domain.uuid])
    }

    fn cpu_stats(&self, domain: &Domain) -> Result<Vec<CpuTimes>> {
        let output = self.run(&["cpu-stats", &domain.uuid, "--total"])?;
        Ok(vec![parse_cpu_stats_total(&output)?])
    }

    fn max_vcpus(&self, domain: &Domain) -> Result<u32> {
        let output = self.run(&["vcpucount", &domain.uuid, "--maximum", "--live"])?;
        output
            .trim()
            .parse()
            .map_err(|e| ExporterError::parse("vcpucount output", format!("{e}: {output:?}")))
    }

    fn memory_stats(&self, domain: &Domain) -> Result<Vec<(String, f64)>> {
        let output = self.run(&["dommemstat", &domain.uuid])?;
        Ok(parse_key_values(&output))
    }

    fn block_stats(&self, domain: &Domain, target: &str) -> Result<Vec<(String, f64)>> {
        let output = self.run(&["domblkstat", &domain.uuid, target])?;
        Ok(parse_block_stats(&output))
    }

    fn block_info(&self, domain: &Domain, target: &str) -> Result<BlockInfo> {
        let output = self.run(&["domblkinfo", &domain.uuid, target])?;
        parse_block_info(&output)
    }

    fn interface_stats(&self, domain: &Domain, target: &str) -> Result<InterfaceStats> {
        let output = self.run(&["domifstat", &domain.uuid, target])?;
        parse_interface_stats(&output)
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Each command opens and closes its own daemon connection.
        debug!("Closed connection to {}", self.uri);
        Ok(())
    }
}

/// Parses `virsh list --id`: one numeric ID per line.
pub fn parse_domain_ids(output: &str) -> Result<Vec<u32>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse()
                .map_err(|e| ExporterError::parse("domain list", format!("{e}: {line:?}")))
        })
        .collect()
}

/// Parses the `Total:` section of `virsh cpu-stats --total`.
///
/// ```text
/// Total:
///         cpu_time        123.456789012 seconds
///         user_time         1.230000000 seconds
/// ```
pub fn parse_cpu_stats_total(output: &str) -> Result<CpuTimes> {
    let seconds = output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("cpu_time"), Some(value)) => value.parse::<f64>().ok(),
                _ => None,
            }
        })
        .next()
        .ok_or_else(|| ExporterError::parse("cpu-stats output", "no cpu_time entry"))?;

    Ok(CpuTimes {
        cpu_time_ns: seconds * NANOS_PER_SECOND,
    })
}

/// Parses `name value` lines, skipping anything that is not numeric.
pub fn parse_key_values(output: &str) -> Vec<(String, f64)> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let key = parts.next()?;
            let value = parts.next()?.parse::<f64>().ok()?;
            Some((key.to_string(), value))
        })
        .collect()
}

/// Parses `virsh domblkstat`: `<dev> <name> <value>` per line.
///
/// Request counters are renamed to libvirt's typed parameter names.
pub fn parse_block_stats(output: &str) -> Vec<(String, f64)> {
    device_counters(output)
        .into_iter()
        .map(|(name, value)| {
            let name = match name.as_str() {
                "rd_req" => "rd_operations".to_string(),
                "wr_req" => "wr_operations".to_string(),
                _ => name,
            };
            (name, value)
        })
        .collect()
}

/// Parses `virsh domblkinfo`: `Capacity:`, `Allocation:`, `Physical:`.
pub fn parse_block_info(output: &str) -> Result<BlockInfo> {
    let mut info = BlockInfo::default();
    let mut seen = 0;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<f64>() else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "capacity" => info.capacity = value,
            "allocation" => info.allocation = value,
            "physical" => info.physical = value,
            _ => continue,
        }
        seen += 1;
    }

    if seen == 0 {
        return Err(ExporterError::parse(
            "domblkinfo output",
            "no capacity/allocation/physical entries",
        ));
    }
    Ok(info)
}

/// Parses `virsh domifstat`: `<dev> rx_bytes <value>` etc.
pub fn parse_interface_stats(output: &str) -> Result<InterfaceStats> {
    let counters = device_counters(output);
    if counters.is_empty() {
        return Err(ExporterError::parse("domifstat output", "no counters"));
    }

    let mut stats = InterfaceStats::default();
    for (name, value) in counters {
        match name.as_str() {
            "rx_bytes" => stats.receive_bytes = value,
            "rx_packets" => stats.receive_packets = value,
            "rx_errs" => stats.receive_errors = value,
            "rx_drop" => stats.receive_drops = value,
            "tx_bytes" => stats.transmit_bytes = value,
            "tx_packets" => stats.transmit_packets = value,
            "tx_errs" => stats.transmit_errors = value,
            "tx_drop" => stats.transmit_drops = value,
            _ => {}
        }
    }
    Ok(stats)
}

/// `<dev> <name> <value>` lines; the device column is dropped.
fn device_counters(output: &str) -> Vec<(String, f64)> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            let value = parts[parts.len() - 1].parse::<f64>().ok()?;
            Some((parts[parts.len() - 2].to_string(), value))
        })
        .collect()
}
