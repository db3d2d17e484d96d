//! StripeFS Metadata Service daemon
//!
//! Serves the namespace over gRPC and exposes Prometheus metrics on a
//! side HTTP port.

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

use stripefs_common::{DEFAULT_MODE, DEFAULT_STRIPE_SIZE_BYTES};
use stripefs_mds::{MdsMetrics, MdsService, Namespace, NamespaceConfig};
use stripefs_proto::metadata::metadata_service_server::MetadataServiceServer;

#[derive(Parser, Debug)]
#[command(name = "stripefs-mds")]
#[command(about = "StripeFS Metadata Service")]
#[command(version)]
struct Args {
    /// Listen address for gRPC
    #[arg(long, default_value = "0.0.0.0:50051")]
    listen: String,

    /// Path of the embedded namespace store file
    #[arg(long, default_value = "./data/mds.redb")]
    db_path: PathBuf,

    /// Comma-separated OST IDs available for striping
    #[arg(long, value_delimiter = ',', default_value = "ost-0,ost-1,ost-2")]
    ost_ids: Vec<String>,

    /// Default stripe size in bytes
    #[arg(long, default_value_t = DEFAULT_STRIPE_SIZE_BYTES)]
    stripe_size_bytes: u32,

    /// Metrics server port (Prometheus)
    #[arg(long, default_value = "9601")]
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

    info!("Starting StripeFS MDS");

    if let Some(parent) = args.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let ost_ids: Vec<String> = args
        .ost_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    let mut cfg = NamespaceConfig::new(args.db_path.clone(), ost_ids.clone());
    cfg.default_mode = DEFAULT_MODE;
    cfg.default_stripe_size = args.stripe_size_bytes;
    let namespace = Arc::new(Namespace::open(cfg)?);

    let service = MdsService::new(namespace.clone());
    let metrics = service.metrics().clone();

    let metrics_state = Arc::new(MetricsState { namespace, metrics });
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
    info!(store = %args.db_path.display(), osts = ?ost_ids, "MDS listening on {addr}");
    info!("Metrics available at http://0.0.0.0:{metrics_port}/metrics");

    Server::builder()
        .add_service(MetadataServiceServer::new(service))
        .serve_with_shutdown(addr, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("MDS shut down gracefully");

    Ok(())
}

struct MetricsState {
    namespace: Arc<Namespace>,
    metrics: Arc<MdsMetrics>,
}

async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let output = state.metrics.export_prometheus(&state.namespace.stats());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
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
