//! Configuration display endpoint handler.

use axum::{extract::State, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    state.scrape_stats.record_http_request();

    (
        [("Content-Type", "text/plain; charset=utf-8")],
        render_config_text(&state.config),
    )
}

fn render_config_text(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "LIBVIRT EXPORTER - CONFIGURATION").ok();
    writeln!(out, "================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER").ok();
    writeln!(out, "------").ok();
    writeln!(out, "bind:            {}", cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)).ok();
    writeln!(out, "port:            {}", cfg.port.unwrap_or(DEFAULT_PORT)).ok();
    writeln!(out, "enable_health:   {}", cfg.enable_health.unwrap_or(true)).ok();
    writeln!(out, "enable_tls:      {}", cfg.enable_tls.unwrap_or(false)).ok();
    if let Some(cert) = &cfg.tls_cert_path {
        writeln!(out, "tls_cert_path:   {}", cert).ok();
    }
    if let Some(key) = &cfg.tls_key_path {
        writeln!(out, "tls_key_path:    {}", key).ok();
    }
    writeln!(out).ok();

    writeln!(out, "SCRAPING").ok();
    writeln!(out, "--------").ok();
    writeln!(out, "uri:             {}", cfg.uri()).ok();
    writeln!(out, "scrape_interval: {} seconds", cfg.scrape_interval().as_secs()).ok();
    writeln!(out, "schedule:        {}", cfg.schedule()).ok();
    writeln!(out, "virsh_binary:    {}", cfg.virsh_binary()).ok();
    writeln!(out).ok();

    writeln!(out, "LOGGING").ok();
    writeln!(out, "-------").ok();
    writeln!(out, "log_level:       {}", cfg.log_level.as_deref().unwrap_or("info")).ok();
    writeln!(out).ok();

    writeln!(out, "{}", FOOTER_TEXT).ok();
    out
}
