//! hatescan server
//!
//! Hate-speech analysis of text segments and audio transcription over HTTP.

use anyhow::Result;
use clap::Parser;
use hatescan_server::{create_router, AppState, Cli, ServiceConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting hatescan server");

    // Load configuration
    let config = ServiceConfig::load(&cli)?;
    info!("Configuration loaded successfully");
    info!("Classifier: {}", config.classifiers.kind);
    if config.transcription.enabled {
        info!(
            "Whisper: {} on {} ({})",
            config.transcription.whisper.repo_id(),
            config.transcription.whisper.device,
            config.transcription.whisper.compute_type
        );
    }

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Initialize application state and load models
    let state = AppState::new(config, metrics_handle)?;
    state.load_models().await?;
    info!("Models loaded successfully");

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    // Graceful shutdown handler
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.unload_models().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("hatescan=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hatescan=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "hatescan_requests_total",
        "Total number of requests by endpoint"
    );
    metrics::describe_counter!(
        "hatescan_segments_total",
        "Classified segments by label"
    );
    metrics::describe_counter!(
        "hatescan_degraded_total",
        "Classifications decided by the fallback heuristic"
    );
    metrics::describe_histogram!(
        "hatescan_classify_latency_us",
        metrics::Unit::Microseconds,
        "Per-segment classification latency in microseconds"
    );
    metrics::describe_counter!("hatescan_errors_total", "Failed requests by error kind");

    info!("Metrics exporter initialized");
    Ok(handle)
}
