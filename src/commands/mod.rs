//! CLI command implementations for libvirt-exporter.
//!
//! - `check`: Hypervisor connectivity and domain listing
//! - `test`: Run scrape cycles and print the exposition text

pub mod check;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use test::command_test;
