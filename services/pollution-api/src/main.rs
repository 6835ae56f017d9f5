//! Pollution API Server
//!
//! Serves gridded pollution datasets as GeoJSON features and PNG rasters.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pollution_api::config::ServiceConfig;
use pollution_api::registry::NetCdfLoader;
use pollution_api::state::AppState;

/// Pollution API Server
#[derive(Parser, Debug)]
#[command(name = "pollution-api")]
#[command(about = "HTTP server for gridded pollution datasets")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000", env = "POLLUTION_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Service config file
    #[arg(short, long, default_value = "config/pollution.yaml", env = "POLLUTION_CONFIG")]
    config: PathBuf,

    /// Override the dataset directory
    #[arg(long, env = "POLLUTION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Override the dataset activated at startup
    #[arg(long, env = "POLLUTION_DATASET")]
    dataset: Option<String>,

    /// Number of worker threads
    #[arg(long, env = "POLLUTION_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder.build().context("Failed to create Tokio runtime")?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting pollution API server");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    pollution_api::metrics::describe();

    let mut config = ServiceConfig::load(&args.config)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(dataset) = args.dataset {
        config.default_dataset = Some(dataset);
    }

    let state = Arc::new(AppState::new(config, Arc::new(NetCdfLoader), metrics));
    state.activate_default().await;

    let app = pollution_api::router(state);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    info!("Pollution API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!("Pollution API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
