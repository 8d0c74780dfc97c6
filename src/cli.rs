//! CLI arguments and subcommands for libvirt-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use libvirt_exporter::SchedulePolicy;
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "libvirt-exporter",
    about = "Prometheus exporter for libvirt domain statistics",
    long_about = "Prometheus exporter for libvirt domain statistics.\n\n\
                  Periodically walks every running domain of a libvirt hypervisor and exports \
                  CPU, memory, block device, disk capacity and network interface statistics, \
                  labelled with OpenStack Nova instance metadata when available.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Seconds between scrape cycles
    #[arg(short = 's', long, alias = "scrape_interval")]
    pub scrape_interval: Option<u64>,

    /// libvirt connection URI
    #[arg(short = 'u', long, alias = "uniform_resource_identifier")]
    pub uri: Option<String>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// How the delay before the next scrape cycle is computed
    #[arg(long, value_enum)]
    pub schedule: Option<SchedulePolicy>,

    /// Path to the virsh binary
    #[arg(long)]
    pub virsh_binary: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the hypervisor and list the running domains
    Check,

    /// Run scrape cycles and print the resulting metrics
    Test {
        /// Number of scrape cycles
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_legacy_flags() {
        let args = Args::parse_from(["libvirt-exporter", "-s", "10", "-u", "test:///default"]);
        assert_eq!(args.scrape_interval, Some(10));
        assert_eq!(args.uri.as_deref(), Some("test:///default"));

        let args = Args::parse_from([
            "libvirt-exporter",
            "--scrape_interval",
            "7",
            "--uniform_resource_identifier",
            "qemu+ssh://host/system",
        ]);
        assert_eq!(args.scrape_interval, Some(7));
        assert_eq!(args.uri.as_deref(), Some("qemu+ssh://host/system"));
    }

    #[test]
    fn test_schedule_and_subcommand() {
        let args = Args::parse_from(["libvirt-exporter", "--schedule", "fixed-rate", "test", "-n", "3"]);
        assert_eq!(args.schedule, Some(SchedulePolicy::FixedRate));
        assert!(matches!(args.command, Some(Commands::Test { iterations: 3 })));
    }
}
