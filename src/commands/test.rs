//! Test command implementation.
//!
//! Runs a fixed number of scrape cycles against the configured hypervisor and
//! prints the resulting exposition text.

use std::sync::Arc;

use libvirt_exporter::{MetricRegistry, ScrapeCycle, VirshHypervisor};

use crate::config::Config;

/// Runs `iterations` scrape cycles, sleeping one scrape interval between them.
pub fn command_test(iterations: usize, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 libvirt exporter - Test Mode");
    println!("===============================");

    let interval = config.scrape_interval();
    let registry = Arc::new(MetricRegistry::new());
    let mut cycle = ScrapeCycle::new(
        Box::new(VirshHypervisor::new(config.virsh_binary())),
        config.uri(),
        interval,
        registry.clone(),
    );

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);
        let report = cycle.run()?;
        println!(
            "   📊 {} domains ({} skipped), {} samples, {} rejected batches in {:.2}ms",
            report.domains,
            report.domains_skipped,
            report.samples_recorded,
            report.schema_mismatches,
            report.duration_seconds * 1000.0
        );
        if iteration < iterations {
            std::thread::sleep(interval);
        }
    }

    println!("\n📄 Exposition:\n");
    print!("{}", registry.encode_text()?);
    Ok(())
}
