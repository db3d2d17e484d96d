//! StripeFS Object Storage Target daemon
//!
//! Serves block I/O over gRPC for one OST identity and data directory,
//! with Prometheus metrics on a side HTTP port.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::Parser;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stripefs_ost::{BlockEngine, OstService};
use stripefs_proto::storage::object_storage_service_server::ObjectStorageServiceServer;

#[derive(Parser, Debug)]
#[command(name = "stripefs-ost")]
#[command(about = "StripeFS Object Storage Target")]
#[command(version)]
struct Args {
    /// Listen address for gRPC
    #[arg(long, default_value = "0.0.0.0:50061")]
    listen: String,

    /// Stable identity of this OST (must match the MDS --ost-ids entry)
    #[arg(long)]
    ost_id: String,

    /// Directory owned exclusively by this OST
    #[arg(long)]
    data_dir: PathBuf,

    /// Metrics server port (Prometheus)
    #[arg(long, default_value = "9602")]
    metrics_port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting StripeFS OST");

    let engine = Arc::new(BlockEngine::new(&args.ost_id, &args.data_dir)?);

    let metrics_state = Arc::new(MetricsState {
        engine: engine.clone(),
    });
    let metrics_port = args.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(metrics_port, metrics_state).await {
            error!("Metrics server error: {e}");
        }
    });

    let addr: SocketAddr = args
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address {}: {e}", args.listen))?;
    info!(
        ost_id = %args.ost_id,
        data_dir = %args.data_dir.display(),
        "OST listening on {addr}"
    );
    info!("Metrics available at http://0.0.0.0:{metrics_port}/metrics");

    Server::builder()
        .add_service(ObjectStorageServiceServer::new(OstService::new(engine)))
        .serve_with_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("OST shut down gracefully");

    Ok(())
}

struct MetricsState {
    engine: Arc<BlockEngine>,
}

async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let output = state.engine.metrics().export_prometheus(state.engine.ost_id());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

async fn health_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    if state.engine.health().healthy {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY")
    }
}

async fn serve_metrics(port: u16, state: Arc<MetricsState>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Starting metrics server on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
