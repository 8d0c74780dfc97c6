//! Error types for the libvirt exporter core.
//!
//! All errors use `thiserror`. Connection-level failures abort a scrape
//! cycle; everything else is scoped to a single domain or metric.

use thiserror::Error;

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Main error type for the scrape pipeline.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Failed to connect to hypervisor at {uri}: {reason}")]
    Connection { uri: String, reason: String },

    #[error("Hypervisor command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("Malformed domain descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Domain descriptor for {uuid} is missing required field `{field}`")]
    MissingDescriptorField { uuid: String, field: &'static str },

    #[error("Metric {metric} has label schema [{expected}] but sample carries [{found}]")]
    SchemaMismatch {
        metric: String,
        expected: String,
        found: String,
    },

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExporterError {
    /// Returns true for failures that leave the whole cycle without a usable
    /// hypervisor connection.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ExporterError::Connection { .. })
    }

    pub(crate) fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ExporterError::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_classification() {
        let conn = ExporterError::Connection {
            uri: "qemu:///system".into(),
            reason: "socket not found".into(),
        };
        assert!(conn.is_connection_failure());

        let cmd = ExporterError::Command {
            command: "dommemstat 3".into(),
            reason: "domain is not running".into(),
        };
        assert!(!cmd.is_connection_failure());
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = ExporterError::SchemaMismatch {
            metric: "libvirt_mem_stats_rss".into(),
            expected: "domain, uuid".into(),
            found: "domain, uuid, project_name".into(),
        };
        assert_eq!(
            err.to_string(),
            "Metric libvirt_mem_stats_rss has label schema [domain, uuid] but sample carries [domain, uuid, project_name]"
        );
    }
}
