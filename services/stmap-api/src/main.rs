//! Stmap API Server
//!
//! Serves spatiotemporal raster queries and TMS tiles over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use stmap_api::config::{load_config, validate};
use stmap_api::handlers;
use stmap_api::state::AppState;

/// Stmap API Server
#[derive(Parser, Debug)]
#[command(name = "stmap-api")]
#[command(about = "Spatiotemporal raster query and tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8090", env = "STMAP_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "STMAP_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// YAML config file
    #[arg(short, long, env = "STMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the asset tree, overriding the config file
    #[arg(long)]
    data_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting stmap API server");

    let mut config = load_config(args.config.as_deref())?;
    if let Some(data_path) = args.data_path {
        config.data_path = data_path;
    }
    validate(&config)?;
    info!(
        data_path = %config.data_path.display(),
        timeout_secs = config.default_timeout.as_secs(),
        cache_bytes = config.cache_capacity_bytes,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(config).with_prometheus(prometheus_handle));

    // Build router
    let app = Router::new()
        // Call endpoint
        .route(
            "/api",
            get(handlers::api_get_handler).post(handlers::api_post_handler),
        )
        // TMS tiles
        .route("/TMS/:asset/:date/:z/:x/:y", get(handlers::tile_handler))
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        );

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    info!(address = %addr, "stmap API listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
