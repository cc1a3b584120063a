//! Axum routes for the hybrid graph service.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::assembler::{AssemblerStats, GraphSummary};
use crate::binner::BinningSummary;
use crate::coverage::CoverageReport;
use crate::ingest::{IngestRequest, IngestResponse};
use crate::realtime::PassReport;
use crate::reducer::ReduceError;
use crate::store::{GraphError, GraphSnapshot};
use crate::GRAPH_KERNEL_SCHEMA_VERSION;

use super::middleware::{record_classify_metrics, record_ingest_metrics};
use super::state::ServiceState;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Coverage and binning of the live graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    /// Estimator outcome.
    pub coverage: CoverageReport,
    /// Bins and edge assignments.
    pub binning: BinningSummary,
}

/// Graph shape, counters and configuration identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    /// Shape and fingerprint.
    pub graph: GraphSummary,
    /// Pipeline counters.
    pub stats: AssemblerStats,
    /// Reads waiting for the realtime loop.
    pub queued: usize,
    /// Hash of the active configuration.
    pub params_hash: String,
    /// Schema version.
    pub schema_version: String,
    /// Last realtime pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass: Option<PassReport>,
}

/// Request to expand a composite vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertRequest {
    /// Composite label, e.g. `[1+,2-]`.
    pub label: String,
}

/// Labels restored by a revert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertResponse {
    /// Expanded composite.
    pub label: String,
    /// Vertices added back to the graph.
    pub restored: Vec<String>,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub params_hash: String,
    pub vertices: usize,
    pub edges: usize,
    pub realtime: bool,
    pub uptime_secs: i64,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID for request tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

fn worker_failed(e: tokio::task::JoinError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("WORKER_FAILED", format!("Blocking task failed: {}", e))),
    )
}

fn revert_error(label: &str, e: ReduceError, correlation_id: Option<&str>) -> ApiError {
    let status = match &e {
        ReduceError::Graph(GraphError::VertexNotFound(_)) => StatusCode::NOT_FOUND,
        ReduceError::Graph(GraphError::NotComposite(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::CONFLICT,
    };
    let mut error = ErrorResponse::new("REVERT_FAILED", e.to_string()).with_details(label.to_string());
    if let Some(id) = correlation_id {
        error = error.with_correlation_id(id);
    }
    tracing::warn!(
        code = %error.code,
        error = %error.error,
        correlation_id = ?error.correlation_id,
        "Revert rejected"
    );
    (status, Json(error))
}

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get("X-Request-Id").and_then(|v| v.to_str().ok())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Bridge and reduce one read.
///
/// Runs on the blocking pool: the whole read holds the graph lock.
async fn ingest_handler(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let start = Instant::now();
    let hits = request.hits.len();
    let assembler = state.assembler.clone();
    let response = tokio::task::spawn_blocking(move || assembler.ingest(&request))
        .await
        .map_err(worker_failed)?;

    state.notify_reads(1);
    record_ingest_metrics(hits, response.useful, start.elapsed().as_millis() as u64);
    Ok(Json(response))
}

/// Estimate coverage and bin the graph.
async fn classify_handler(
    State(state): State<Arc<ServiceState>>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let start = Instant::now();
    let assembler = state.assembler.clone();
    let classification = tokio::task::spawn_blocking(move || assembler.classify())
        .await
        .map_err(worker_failed)?;

    record_classify_metrics(
        classification.coverage.converged,
        classification.binning.bins.len(),
        classification.binning.unresolved.len(),
        start.elapsed().as_millis() as u64,
    );
    Ok(Json(ClassifyResponse {
        coverage: classification.coverage,
        binning: classification.binning.summary(),
    }))
}

/// Graph shape and pipeline counters.
async fn graph_handler(State(state): State<Arc<ServiceState>>) -> Json<GraphResponse> {
    Json(GraphResponse {
        graph: state.assembler.summary(),
        stats: state.assembler.stats(),
        queued: state.assembler.queued(),
        params_hash: state.params_hash.clone(),
        schema_version: GRAPH_KERNEL_SCHEMA_VERSION.to_string(),
        last_pass: state.realtime.as_ref().and_then(|h| h.last_report()),
    })
}

/// Export the live graph as loader records.
async fn snapshot_handler(State(state): State<Arc<ServiceState>>) -> Json<GraphSnapshot> {
    Json(state.assembler.snapshot())
}

/// Expand a composite vertex one level.
async fn revert_handler(
    State(state): State<Arc<ServiceState>>,
    headers: HeaderMap,
    Json(request): Json<RevertRequest>,
) -> Result<Json<RevertResponse>, ApiError> {
    let restored = state
        .assembler
        .revert(&request.label)
        .map_err(|e| revert_error(&request.label, e, request_id(&headers)))?;
    Ok(Json(RevertResponse {
        label: request.label,
        restored,
    }))
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<Arc<ServiceState>>) -> Json<HealthResponse> {
    let graph = state.assembler.summary();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: GRAPH_KERNEL_SCHEMA_VERSION.to_string(),
        params_hash: state.params_hash.clone(),
        vertices: graph.vertices,
        edges: graph.edges,
        realtime: state.realtime.is_some(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// Liveness endpoint.
///
/// Returns 200 if the process is alive. Does not touch the graph lock.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness endpoint.
///
/// Returns 200 once a non-empty graph is loaded, 503 otherwise.
async fn readiness_handler(
    State(state): State<Arc<ServiceState>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let vertices = state.assembler.with_graph(|g| g.num_vertices());
    if vertices > 0 {
        Ok(Json(ReadinessResponse {
            ready: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                details: Some("Graph is empty".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the hybrid graph service.
pub fn create_router(state: ServiceState) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Evidence and resolution
        .route("/api/ingest", post(ingest_handler))
        .route("/api/classify", post(classify_handler))
        .route("/api/revert", post(revert_handler))
        // Graph inspection
        .route("/api/graph", get(graph_handler))
        .route("/api/graph/snapshot", get(snapshot_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::ingest::HitMessage;
    use crate::store::GraphStore;
    use crate::types::Vertex;

    fn state() -> Arc<ServiceState> {
        let mut g = GraphStore::new(3);
        for label in ["a", "b", "c"] {
            g.add_vertex(Vertex::new(label).with_sequence("G".repeat(1_000)), false);
        }
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge("b", "c", true, false).unwrap();
        Arc::new(ServiceState::new(g, KernelConfig::default()))
    }

    fn hit(target: &str, query_start: usize) -> HitMessage {
        HitMessage {
            target_name: target.to_string(),
            target_length: 1_000,
            target_start: 0,
            target_end: 1_000,
            query_name: "r".to_string(),
            query_length: 4_000,
            query_start,
            query_end: query_start + 1_000,
            strand: true.into(),
            score: 1_000,
            quality: 60,
        }
    }

    #[tokio::test]
    async fn test_ingest_then_revert() {
        let state = state();
        let request = IngestRequest {
            read_id: "r1".to_string(),
            hits: vec![hit("a", 0), hit("c", 1_994)],
        };
        let Json(response) = ingest_handler(State(Arc::clone(&state)), Json(request))
            .await
            .unwrap();
        assert!(response.useful);

        let Json(graph) = graph_handler(State(Arc::clone(&state))).await;
        assert_eq!(graph.graph.composites, 1);
        assert_eq!(graph.stats.reads_useful, 1);

        let Json(reverted) = revert_handler(
            State(Arc::clone(&state)),
            HeaderMap::new(),
            Json(RevertRequest {
                label: "[a+,b+,c+]".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(reverted.restored.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_read_is_not_useful() {
        let state = state();
        let before = state.assembler.summary();
        let request = IngestRequest {
            read_id: "r0".to_string(),
            hits: vec![],
        };
        let Json(response) = ingest_handler(State(Arc::clone(&state)), Json(request))
            .await
            .unwrap();
        assert!(!response.useful);
        assert_eq!(state.assembler.summary(), before);
    }

    #[tokio::test]
    async fn test_revert_errors_map_to_status() {
        let state = state();
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", "req-7".parse().unwrap());
        let missing = revert_handler(
            State(Arc::clone(&state)),
            headers,
            Json(RevertRequest {
                label: "zz".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(missing.0, StatusCode::NOT_FOUND);
        assert_eq!(missing.1.correlation_id.as_deref(), Some("req-7"));
        assert_eq!(missing.1.details.as_deref(), Some("zz"));

        let primitive = revert_handler(
            State(Arc::clone(&state)),
            HeaderMap::new(),
            Json(RevertRequest {
                label: "a".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(primitive.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_classify_and_health_checks() {
        let state = state();
        let Json(classified) = classify_handler(State(Arc::clone(&state))).await.unwrap();
        assert!(classified.coverage.converged);
        assert!(classified.binning.bins.is_empty());

        assert!(readiness_handler(State(Arc::clone(&state))).await.is_ok());
        let Json(health) = health_handler(State(state)).await;
        assert_eq!(health.vertices, 3);
        assert!(!health.realtime);

        let empty = Arc::new(ServiceState::new(GraphStore::new(3), KernelConfig::default()));
        assert!(readiness_handler(State(empty)).await.is_err());
    }
}
