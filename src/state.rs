//! Application state shared with the HTTP handlers.
//!
//! The scheduler thread writes into the registry and the scrape stats; the
//! handlers only read them.

use libvirt_exporter::{MetricRegistry, ScrapeStats};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub registry: Arc<MetricRegistry>,
    pub scrape_stats: Arc<ScrapeStats>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<MetricRegistry>, scrape_stats: Arc<ScrapeStats>, config: Config) -> Self {
        Self {
            registry,
            scrape_stats,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
