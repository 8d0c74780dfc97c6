//! Health check endpoint handler.
//!
//! Reports 200 once at least one scrape cycle has completed and 503 before,
//! followed by the scrape statistics table.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("libvirt-exporter ", env!("CARGO_PKG_VERSION"));

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.scrape_stats.record_http_request();

    let (status, message) = if state.scrape_stats.has_completed_cycle() {
        (StatusCode::OK, "OK")
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Waiting for the first scrape cycle",
        )
    };

    let uptime = format_uptime(state.scrape_stats.get_uptime_seconds());
    let table = state.scrape_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime}\n\n{table}\n{FOOTER_TEXT}\n"),
    )
}

/// Human-friendly uptime: minutes below an hour, hours below a day.
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds as f64 / 3600.0;
    if hours < 1.0 {
        format!("{:.1} minutes", hours * 60.0)
    } else if hours < 24.0 {
        format!("{:.1} hours", hours)
    } else {
        format!("{:.1} days", hours / 24.0)
    }
}
