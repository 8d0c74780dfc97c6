//! Metrics endpoint handler for Prometheus scraping.
//!
//! Only encodes what the scheduler has already recorded; a request never
//! triggers hypervisor calls.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    debug!("Processing /metrics request");
    state.scrape_stats.record_http_request();

    let body = state.registry.encode_text().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!("Encoded {} metric families", state.registry.metric_count());
    Ok((
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}
