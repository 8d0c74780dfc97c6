//! libvirt-exporter
//!
//! Prometheus exporter for libvirt domain statistics with tracing logging.
//! This is the main entry point that starts the scrape scheduler, serves the
//! HTTP endpoints and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod state;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use libvirt_exporter::{
    ExporterMetrics, MetricRegistry, ScrapeCycle, ScrapeStats, Scheduler, VirshHypervisor,
};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::oneshot};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{config_handler, health_handler, metrics_handler, root_handler};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Starts the self-rearming scrape loop on its own thread. The receiver
/// resolves only when the loop ends, i.e. the hypervisor connection is lost.
fn spawn_scheduler(
    config: &Config,
    registry: Arc<MetricRegistry>,
    stats: Arc<ScrapeStats>,
    metrics: ExporterMetrics,
) -> std::io::Result<oneshot::Receiver<libvirt_exporter::Result<()>>> {
    let interval = config.scrape_interval();
    let cycle = ScrapeCycle::new(
        Box::new(VirshHypervisor::new(config.virsh_binary())),
        config.uri(),
        interval,
        registry,
    )
    .with_stats(stats)
    .with_metrics(metrics);
    let scheduler = Scheduler::new(cycle, interval, config.schedule());

    info!(
        "Scraping {} every {}s ({})",
        config.uri(),
        interval.as_secs(),
        config.schedule()
    );
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("scrape-scheduler".into())
        .spawn(move || {
            let _ = tx.send(scheduler.run());
        })?;
    Ok(rx)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    setup_logging(&args);

    // Handle subcommands
    if let Some(command) = &args.command {
        let config = load_validated_config(&args)?;
        return match command {
            Commands::Check => command_check(&config),
            Commands::Test { iterations } => command_test(*iterations, &config),
        };
    }

    let config = load_validated_config(&args)?;

    info!("Starting libvirt-exporter {}", env!("CARGO_PKG_VERSION"));

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Domain gauges and self-telemetry share one Prometheus registry
    let prometheus_registry = Registry::new();
    let metrics = ExporterMetrics::new(&prometheus_registry)?;
    let registry = Arc::new(MetricRegistry::with_registry(prometheus_registry));
    let scrape_stats = Arc::new(ScrapeStats::new());
    debug!("Prometheus registry initialized");

    let scheduler = spawn_scheduler(&config, registry.clone(), scrape_stats.clone(), metrics)?;

    let state: SharedState = Arc::new(AppState::new(registry, scrape_stats, config.clone()));

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Scheduler termination means the hypervisor connection was lost
    let scheduler_exit = async {
        match scheduler.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Scrape scheduler stopped: {}", e);
                Err::<(), Box<dyn std::error::Error>>(e.into())
            }
            Err(_) => {
                error!("Scrape scheduler thread terminated unexpectedly");
                Err("scrape scheduler thread terminated".into())
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/config", get(config_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state);

    let tls_paths = match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) if config.enable_tls.unwrap_or(false) => Some((cert, key)),
        _ => None,
    };

    if let Some((cert_path, key_path)) = tls_paths {
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!("libvirt-exporter listening on https://{}:{}", bind_ip_str, port);

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            result = scheduler_exit => return result,
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!("libvirt-exporter listening on http://{}:{}", bind_ip_str, port);

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            result = scheduler_exit => return result,
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    info!("libvirt-exporter stopped gracefully");
    Ok(())
}
