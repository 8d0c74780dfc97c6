//! Label extraction for domain metrics.
//!
//! Every sample carries the identity of the domain it was read from. The
//! identity comes from one of two descriptor shapes: domains started by
//! OpenStack Nova carry an instance/project metadata block, all others only
//! have their bare libvirt name.

use std::fmt;

use crate::descriptor::DomainDescriptor;
use crate::error::{ExporterError, Result};

pub const LABEL_DOMAIN: &str = "domain";
pub const LABEL_UUID: &str = "uuid";
pub const LABEL_PROJECT_NAME: &str = "project_name";
pub const LABEL_TARGET_DISK: &str = "target_disk";
pub const LABEL_TARGET_INTERFACE: &str = "target_interface";

/// Ordered label name/value pairs attached to a sample.
///
/// Insertion order is preserved: the registry derives a metric's label
/// schema from the key order of its first sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a label, replacing the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(key, _)| *key == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Returns a copy with one extra label appended.
    pub fn with(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels = self.clone();
        labels.insert(name, value);
        labels
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = LabelSet::new();
        for (k, v) in iter {
            labels.insert(k, v);
        }
        labels
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (k, v)) in self.pairs.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}=\"{}\"", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Identity of a domain as read from its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainIdentity {
    /// Started by Nova: instance name and owning project.
    Orchestrated {
        instance_name: String,
        project_name: String,
    },
    /// No orchestration metadata: bare libvirt name.
    Bare { name: String },
}

impl DomainIdentity {
    /// Resolves the identity variant. Nova metadata wins when present; a
    /// metadata block with missing fields is an integrity error.
    pub fn from_descriptor(descriptor: &DomainDescriptor, uuid: &str) -> Result<Self> {
        let missing = |field| ExporterError::MissingDescriptorField {
            uuid: uuid.to_string(),
            field,
        };

        match &descriptor.nova {
            Some(nova) => Ok(DomainIdentity::Orchestrated {
                instance_name: nova
                    .instance_name
                    .clone()
                    .ok_or_else(|| missing("metadata/instance/name"))?,
                project_name: nova
                    .project_name
                    .clone()
                    .ok_or_else(|| missing("metadata/instance/owner/project"))?,
            }),
            None => Ok(DomainIdentity::Bare {
                name: descriptor.name.clone().ok_or_else(|| missing("name"))?,
            }),
        }
    }

    /// Builds the label set: `domain`, `uuid`, then `project_name` for
    /// orchestrated domains.
    pub fn labels(&self, uuid: &str) -> LabelSet {
        let mut labels = LabelSet::new();
        match self {
            DomainIdentity::Orchestrated {
                instance_name,
                project_name,
            } => {
                labels.insert(LABEL_DOMAIN, instance_name.as_str());
                labels.insert(LABEL_UUID, uuid);
                labels.insert(LABEL_PROJECT_NAME, project_name.as_str());
            }
            DomainIdentity::Bare { name } => {
                labels.insert(LABEL_DOMAIN, name.as_str());
                labels.insert(LABEL_UUID, uuid);
            }
        }
        labels
    }
}

/// Derives the identity label set for one domain.
pub fn extract_labels(descriptor: &DomainDescriptor, uuid: &str) -> Result<LabelSet> {
    Ok(DomainIdentity::from_descriptor(descriptor, uuid)?.labels(uuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::NovaMetadata;

    const UUID: &str = "4dea22b3-1d52-d8f3-2516-782e98ab3fa0";

    #[test]
    fn test_orchestrated_labels() {
        let descriptor = DomainDescriptor {
            name: Some("instance-0000002a".into()),
            nova: Some(NovaMetadata {
                instance_name: Some("web-frontend-1".into()),
                project_name: Some("production".into()),
            }),
            ..Default::default()
        };

        let labels = extract_labels(&descriptor, UUID).unwrap();
        assert_eq!(
            labels.keys().collect::<Vec<_>>(),
            vec![LABEL_DOMAIN, LABEL_UUID, LABEL_PROJECT_NAME]
        );
        assert_eq!(labels.get(LABEL_DOMAIN), Some("web-frontend-1"));
        assert_eq!(labels.get(LABEL_UUID), Some(UUID));
        assert_eq!(labels.get(LABEL_PROJECT_NAME), Some("production"));
    }

    #[test]
    fn test_bare_labels() {
        let descriptor = DomainDescriptor {
            name: Some("builder".into()),
            ..Default::default()
        };

        let labels = extract_labels(&descriptor, UUID).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(LABEL_DOMAIN), Some("builder"));
        assert_eq!(labels.get(LABEL_UUID), Some(UUID));
        assert_eq!(labels.get(LABEL_PROJECT_NAME), None);
    }

    #[test]
    fn test_missing_name_is_integrity_error() {
        let err = extract_labels(&DomainDescriptor::default(), UUID).unwrap_err();
        match err {
            ExporterError::MissingDescriptorField { uuid, field } => {
                assert_eq!(uuid, UUID);
                assert_eq!(field, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_incomplete_nova_metadata_is_integrity_error() {
        let descriptor = DomainDescriptor {
            name: Some("instance-0000002a".into()),
            nova: Some(NovaMetadata {
                instance_name: Some("web-frontend-1".into()),
                project_name: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            extract_labels(&descriptor, UUID),
            Err(ExporterError::MissingDescriptorField { .. })
        ));
    }

    #[test]
    fn test_label_set_order_and_replace() {
        let mut labels: LabelSet = [("domain", "a"), ("uuid", "u")].into_iter().collect();
        labels.insert("domain", "b");
        let device = labels.with(LABEL_TARGET_DISK, "vda");

        assert_eq!(labels.values().collect::<Vec<_>>(), vec!["b", "u"]);
        assert_eq!(
            device.keys().collect::<Vec<_>>(),
            vec!["domain", "uuid", "target_disk"]
        );
        assert_eq!(device.to_string(), r#"{domain="b",uuid="u",target_disk="vda"}"#);
    }
}
