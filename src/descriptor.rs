//! Domain descriptor parsing.
//!
//! The hypervisor describes every domain as an XML document. This module
//! turns that document into a small namespace-aware element tree and pulls
//! out the handful of fields the exporter needs: the bare domain name, the
//! OpenStack Nova metadata block, and the device targets for disks and
//! network interfaces.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::{ExporterError, Result};

/// Namespace of the metadata block written by OpenStack Nova.
pub const NOVA_NAMESPACE: &str = "http://openstack.org/xmlns/libvirt/nova/1.0";

/// One element of a parsed descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Local name, without any namespace prefix.
    pub name: String,
    /// Resolved namespace URI, if the element is bound to one.
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn open(namespace: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<Self> {
        let namespace = match namespace {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.0).into_owned()),
            _ => None,
        };

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ExporterError::MalformedDescriptor(e.to_string()))?;
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ExporterError::MalformedDescriptor(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            namespace,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// Parses an XML document into its root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();

        loop {
            let (ns, event) = reader
                .read_resolved_event()
                .map_err(|e| ExporterError::MalformedDescriptor(e.to_string()))?;

            match event {
                Event::Start(start) => {
                    let element = Element::open(ns, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = Element::open(ns, &start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        ExporterError::MalformedDescriptor("unbalanced closing tag".into())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| ExporterError::MalformedDescriptor(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => {
                    return Err(ExporterError::MalformedDescriptor(
                        "document ended before the root element was closed".into(),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Returns the value of an attribute by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given local name, in any namespace.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given local name bound to `namespace`.
    pub fn child_ns(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace.as_deref() == Some(namespace))
    }

    /// All children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Walks a `/`-separated path of local names.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |element, segment| element.child(segment))
    }

    /// Non-empty element text.
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}

/// Orchestration metadata written by OpenStack Nova.
#[derive(Debug, Clone, PartialEq)]
pub struct NovaMetadata {
    pub instance_name: Option<String>,
    pub project_name: Option<String>,
}

/// Fields of a domain descriptor consumed by the exporter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainDescriptor {
    pub name: Option<String>,
    pub nova: Option<NovaMetadata>,
    /// Target device names of entries typed as `device='disk'`.
    pub disk_targets: Vec<String>,
    /// Target device names of network interfaces.
    pub interface_targets: Vec<String>,
}

/// Device kinds enumerated from the `devices` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Disk,
    Interface,
}

impl DomainDescriptor {
    /// Parses the XML returned by the hypervisor for one domain.
    pub fn parse(xml: &str) -> Result<Self> {
        let root = Element::parse(xml)?;
        if root.name != "domain" {
            return Err(ExporterError::MalformedDescriptor(format!(
                "expected <domain> root element, found <{}>",
                root.name
            )));
        }
        Ok(Self::from_element(&root))
    }

    fn from_element(root: &Element) -> Self {
        let name = root.child("name").and_then(Element::text).map(str::to_string);

        let nova = root
            .child("metadata")
            .and_then(|metadata| metadata.child_ns(NOVA_NAMESPACE, "instance"))
            .map(|instance| NovaMetadata {
                instance_name: instance
                    .child_ns(NOVA_NAMESPACE, "name")
                    .and_then(Element::text)
                    .map(str::to_string),
                project_name: instance
                    .child_ns(NOVA_NAMESPACE, "owner")
                    .and_then(|owner| owner.child_ns(NOVA_NAMESPACE, "project"))
                    .and_then(Element::text)
                    .map(str::to_string),
            });

        Self {
            name,
            nova,
            disk_targets: device_targets(root, DeviceKind::Disk),
            interface_targets: device_targets(root, DeviceKind::Interface),
        }
    }

    pub fn targets(&self, kind: DeviceKind) -> &[String] {
        match kind {
            DeviceKind::Disk => &self.disk_targets,
            DeviceKind::Interface => &self.interface_targets,
        }
    }
}

/// Collects `devices/<kind>/target/@dev`; disks must be typed `device='disk'`
/// so CD-ROM and floppy entries are left out.
fn device_targets(root: &Element, kind: DeviceKind) -> Vec<String> {
    let Some(devices) = root.child("devices") else {
        return Vec::new();
    };

    let tag = match kind {
        DeviceKind::Disk => "disk",
        DeviceKind::Interface => "interface",
    };

    devices
        .children_named(tag)
        .filter(|device| kind != DeviceKind::Disk || device.attribute("device") == Some("disk"))
        .filter_map(|device| device.child("target"))
        .filter_map(|target| target.attribute("dev"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOVA_DOMAIN: &str = r#"
<domain type='kvm' id='7'>
  <name>instance-0000002a</name>
  <uuid>4dea22b3-1d52-d8f3-2516-782e98ab3fa0</uuid>
  <metadata>
    <nova:instance xmlns:nova="http://openstack.org/xmlns/libvirt/nova/1.0">
      <nova:package version="25.1.0"/>
      <nova:name>web-frontend-1</nova:name>
      <nova:owner>
        <nova:user uuid="a1">alice</nova:user>
        <nova:project uuid="p1">production</nova:project>
      </nova:owner>
    </nova:instance>
  </metadata>
  <devices>
    <disk type='file' device='disk'>
      <source file='/var/lib/nova/instances/disk'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <disk type='file' device='cdrom'>
      <target dev='hdc' bus='ide'/>
    </disk>
    <disk type='file' device='disk'>
      <target dev='vdb' bus='virtio'/>
    </disk>
    <interface type='bridge'>
      <mac address='fa:16:3e:00:00:01'/>
      <target dev='tap0'/>
    </interface>
    <interface type='bridge'>
      <mac address='fa:16:3e:00:00:02'/>
    </interface>
  </devices>
</domain>"#;

    #[test]
    fn test_parse_nova_domain() {
        let descriptor = DomainDescriptor::parse(NOVA_DOMAIN).unwrap();
        assert_eq!(descriptor.name.as_deref(), Some("instance-0000002a"));

        let nova = descriptor.nova.expect("nova metadata");
        assert_eq!(nova.instance_name.as_deref(), Some("web-frontend-1"));
        assert_eq!(nova.project_name.as_deref(), Some("production"));

        assert_eq!(descriptor.disk_targets, vec!["vda", "vdb"]);
        assert_eq!(descriptor.interface_targets, vec!["tap0"]);
    }

    #[test]
    fn test_parse_plain_domain() {
        let xml = "<domain type='kvm'><name>builder</name><devices/></domain>";
        let descriptor = DomainDescriptor::parse(xml).unwrap();
        assert_eq!(descriptor.name.as_deref(), Some("builder"));
        assert!(descriptor.nova.is_none());
        assert!(descriptor.targets(DeviceKind::Disk).is_empty());
        assert!(descriptor.targets(DeviceKind::Interface).is_empty());
    }

    #[test]
    fn test_foreign_metadata_is_not_nova() {
        let xml = r#"<domain><name>vm1</name><metadata>
            <app:info xmlns:app="http://example.com/app"><app:name>x</app:name></app:info>
        </metadata></domain>"#;
        let descriptor = DomainDescriptor::parse(xml).unwrap();
        assert!(descriptor.nova.is_none());
    }

    #[test]
    fn test_unexpected_root_is_rejected() {
        let err = DomainDescriptor::parse("<network><name>default</name></network>").unwrap_err();
        assert!(matches!(err, ExporterError::MalformedDescriptor(_)));
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        assert!(Element::parse("<domain><name>vm1</name>").is_err());
    }

    #[test]
    fn test_element_find_and_escaped_text() {
        let root = Element::parse("<a><b><c k='v'>x &amp; y</c></b></a>").unwrap();
        let c = root.find("b/c").unwrap();
        assert_eq!(c.attribute("k"), Some("v"));
        assert_eq!(c.text(), Some("x & y"));
        assert!(root.find("b/missing").is_none());
    }
}
