//! Hybrid Graph Service Binary
//!
//! Runs the resolution kernel as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Background realtime resolution loop
//! - Graceful shutdown handling with a final resolution pass
//!
//! ## Configuration
//!
//! Environment variables:
//! - `GRAPH_PATH`: JSON graph snapshot (`{"kmer": .., "records": [..]}`) to load (required)
//! - `KERNEL_CONFIG`: JSON `KernelConfig` file (default: built-in defaults)
//! - `PORT`: Service port (default: 8001)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! GRAPH_PATH=graph.json cargo run --bin hybrid_graph_service --features service
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use hybrid_graph_kernel::service::{create_router, metrics_middleware, ServiceState};
use hybrid_graph_kernel::{Assembler, GraphSnapshot, KernelConfig, RealtimeLoop, ResolutionPass};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hybrid_graph_service=info,hybrid_graph_kernel=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Request logging middleware that adds correlation ID and timing
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let trace_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    info!(
        target: "hybrid_graph_service::access",
        trace_id = %trace_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

fn load_config() -> Result<KernelConfig, Box<dyn std::error::Error>> {
    let config = match std::env::var("KERNEL_CONFIG") {
        Ok(path) if !path.is_empty() => {
            info!(path = %path, "Loading kernel configuration");
            KernelConfig::from_path(&path)?
        }
        _ => {
            info!("KERNEL_CONFIG not set, using defaults");
            KernelConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

fn load_graph() -> Result<hybrid_graph_kernel::GraphStore, Box<dyn std::error::Error>> {
    let path = std::env::var("GRAPH_PATH").map_err(|_| "GRAPH_PATH must name a graph snapshot")?;
    let load_start = Instant::now();
    let text = std::fs::read_to_string(&path)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&text)?;
    let graph = snapshot.restore()?;
    info!(
        path = %path,
        kmer = graph.kmer(),
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        latency_ms = load_start.elapsed().as_millis() as u64,
        "Graph loaded"
    );
    Ok(graph)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");
    info!(version = version, build_sha = build_sha, "Starting Hybrid Graph Service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8001);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let config = load_config()?;
    info!(params_hash = %config.params_hash(), "Kernel configuration ready");
    let graph = load_graph()?;

    let realtime_config = config.realtime.clone();
    let assembler = Assembler::new(graph, config);
    let realtime = RealtimeLoop::start(realtime_config, ResolutionPass::new(assembler.clone()))?;
    let state = ServiceState::from_assembler(assembler).with_realtime(realtime.handle());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, version = version, "Hybrid Graph Service listening");

    let listener = TcpListener::bind(addr).await?;
    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final pass runs on a blocking thread so the runtime can wind down.
    match tokio::task::spawn_blocking(move || realtime.stop()).await {
        Ok(Some(report)) => info!(pass = report.pass, reads = report.reads, "Final resolution pass complete"),
        Ok(None) => warn!("Realtime loop did not finish before the shutdown timeout"),
        Err(e) => error!(error = %e, "Realtime shutdown task failed"),
    }

    info!("Hybrid Graph Service shutdown complete");
    Ok(())
}
