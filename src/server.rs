//! HTTP Server and Collection Loop
//!
//! This module implements the Prometheus exporter HTTP server and the device
//! polling loop.
//!
//! # Architecture
//!
//! - **HTTP Server**: Axum-based server exposing `/metrics`, `/health`, and `/` endpoints
//! - **Collection Loop**: Background task that polls every device, then sleeps
//!   for the configured interval
//! - **Shutdown**: SIGINT/SIGTERM stop the server and cancel the loop,
//!   including any cycle still in flight
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - 200 if at least one device is up, 503 otherwise
//!
//! # Error Handling
//!
//! Device failures are reflected in the gauges and never stop the loop. The
//! interval is constant regardless of how many devices failed.

use crate::collector::{self, CollectionContext};
use crate::config::Config;
use crate::devices::{self, DeviceDescriptor};
use crate::metrics::MetricsCollector;
use crate::switchbot::SwitchBotClient;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    metrics: MetricsCollector,
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let devices = devices::load_devices(&config.metrics.device_config_path);
    let metrics = MetricsCollector::new()?;
    let client = Arc::new(SwitchBotClient::new(config.switchbot.clone())?);

    let ctx = CollectionContext {
        client,
        metrics: metrics.clone(),
        rate_limit_low_water: config.metrics.rate_limit_low_water,
    };

    // Start background metrics collection
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_secs(config.metrics.collection_interval_seconds);
    let collection = tokio::spawn(collect_metrics_loop(ctx, devices, interval, shutdown_rx));

    // Start the server
    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = collection.await {
        error!("Collection loop terminated abnormally: {}", e);
    }

    info!("Exporter stopped");
    Ok(())
}

/// Router serving the exporter endpoints for the given metric set
pub fn router(metrics: MetricsCollector) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { metrics })
}

/// Poll all devices, sleep, repeat until `shutdown` flips or its sender is dropped.
pub async fn collect_metrics_loop(
    ctx: CollectionContext,
    devices: Vec<DeviceDescriptor>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Polling {} device(s) every {}s",
        devices.len(),
        interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = collector::run_cycle(&ctx, &devices) => {}
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(interval) => {}
        }
    }

    info!("Collection loop stopped");
}

/// Resolves on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn root_handler() -> impl IntoResponse {
    axum::response::Html(
        r#"<html>
<head><title>SwitchBot Exporter</title></head>
<body>
<h1>SwitchBot Prometheus Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.metrics.any_device_up() {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "No SwitchBot device reachable",
        )
    }
}
