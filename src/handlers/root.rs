//! Landing page listing the exporter's endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::{format_uptime, FOOTER_TEXT};
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.scrape_stats.record_http_request();

    let health_link = if state.config.enable_health.unwrap_or(true) {
        r#"<li><a href="/health">/health</a> - scrape cycle statistics (text)</li>"#
    } else {
        ""
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>libvirt exporter</title>
    <style>
        body {{ font-family: sans-serif; margin: 2em auto; max-width: 720px; color: #333; }}
        h1 {{ border-bottom: 2px solid #3b6ea5; padding-bottom: 8px; }}
        a {{ color: #3b6ea5; }}
        .meta {{ background: #eef2f6; padding: 10px 14px; border-radius: 4px; }}
        .footer {{ margin-top: 3em; font-size: 0.85em; color: #777; }}
    </style>
</head>
<body>
    <h1>libvirt exporter</h1>
    <p class="meta">version <b>{version}</b> (built {built}) &middot; uptime <b>{uptime}</b> &middot; hypervisor <code>{uri}</code></p>
    <ul>
        <li><a href="/metrics">/metrics</a> - domain statistics in Prometheus text format</li>
        {health_link}
        <li><a href="/config">/config</a> - effective configuration</li>
    </ul>
    <p class="footer">{footer}</p>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
        built = env!("VERGEN_BUILD_DATE"),
        uptime = format_uptime(state.start_time.elapsed().as_secs()),
        uri = state.config.uri(),
        health_link = health_link,
        footer = FOOTER_TEXT,
    ))
}
