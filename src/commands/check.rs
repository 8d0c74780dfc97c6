//! Check command implementation.
//!
//! Opens the configured hypervisor, lists the running domains with the
//! identity labels they would be exported under and exits 0 or 1.

use libvirt_exporter::hypervisor::Connection;
use libvirt_exporter::{extract_labels, DomainDescriptor, Hypervisor, VirshHypervisor};

use crate::config::Config;

/// Validates hypervisor connectivity.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 libvirt exporter - Hypervisor Check");
    println!("======================================");
    println!("\n🔌 Connecting to {} ...", config.uri());

    let hypervisor = VirshHypervisor::new(config.virsh_binary());
    let conn = match hypervisor.open(config.uri()) {
        Ok(conn) => conn,
        Err(e) => {
            println!("   ❌ {}", e);
            std::process::exit(1);
        }
    };
    println!("   ✅ Connected");

    let all_ok = report_domains(conn.as_ref());
    if let Err(e) = conn.close() {
        println!("   ⚠️  Failed to close connection: {}", e);
    }

    println!();
    if all_ok {
        println!("✅ All checks passed");
        Ok(())
    } else {
        println!("❌ Some domains cannot be exported");
        std::process::exit(1);
    }
}

fn report_domains(conn: &dyn Connection) -> bool {
    let ids = match conn.list_running_domain_ids() {
        Ok(ids) => ids,
        Err(e) => {
            println!("   ❌ Failed to list running domains: {}", e);
            return false;
        }
    };
    println!("\n🖥️  {} running domain(s)", ids.len());

    let mut all_ok = true;
    for id in ids {
        let domain = match conn.lookup_domain(id) {
            Ok(Some(domain)) => domain,
            Ok(None) => {
                println!("   ⚠️  Domain {} vanished during lookup", id);
                continue;
            }
            Err(e) => {
                println!("   ❌ Domain {}: {}", id, e);
                all_ok = false;
                continue;
            }
        };

        let labels = conn
            .describe_domain(&domain)
            .and_then(|xml| DomainDescriptor::parse(&xml))
            .and_then(|descriptor| extract_labels(&descriptor, &domain.uuid));
        match labels {
            Ok(labels) => println!("   ✅ {} {}", id, labels),
            Err(e) => {
                println!("   ❌ {} ({}): {}", id, domain.uuid, e);
                all_ok = false;
            }
        }
    }
    all_ok
}
