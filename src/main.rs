use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use iggy_rest_proxy::{AppState, Config, IggyClientWrapper, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        "Starting Iggy REST proxy v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        stream = %config.stream,
        flush_messages = config.producer_flush_messages,
        flush_interval_ms = config.producer_flush_interval.as_millis() as u64,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_addr() {
        metrics::try_init_metrics(addr, config.telemetry_source.as_deref());
    } else {
        info!("Prometheus metrics disabled (METRICS_PORT=0)");
    }

    // Without a broker connection there is nothing to serve
    info!("Connecting to Iggy server...");
    let iggy_client = IggyClientWrapper::new(config.clone()).await.map_err(|e| {
        error!("Failed to connect to Iggy server: {e}");
        exitcode::UNAVAILABLE
    })?;
    iggy_client.initialize().await.map_err(|e| {
        error!("Failed to initialize stream '{}': {e}", config.stream);
        exitcode::UNAVAILABLE
    })?;
    info!(stream = %config.stream, "Iggy stream ready");

    let connection = iggy_client.connection_state();
    let state = AppState::new(iggy_client, connection, config.clone());
    let app = build_router(state.clone());

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  POST /topics/{{topic}} - Publish a batch of records");
    info!("  GET  /health          - Health check");
    info!("  GET  /ready           - Readiness check");
    info!("  GET  /stats           - Delivery counters");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await;

    // Drain deliveries even when the server stopped on an error
    info!("HTTP server stopped, draining pending deliveries...");
    let counters = state.shutdown().await;

    served.map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!(
        success = counters.success,
        errors = counters.errors,
        "Server shutdown complete"
    );
    Ok(())
}
