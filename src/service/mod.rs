//! Hybrid Graph REST Service
//!
//! Exposes the evidence ingest boundary and graph inspection over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api/ingest` - Bridge and reduce one read's hits
//! - `POST /api/classify` - Estimate edge coverage and bin the graph
//! - `POST /api/revert` - Expand a composite vertex
//! - `GET /api/graph` - Graph shape, fingerprint and counters
//! - `GET /api/graph/snapshot` - Export the graph as loader records
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_classify_metrics, record_ingest_metrics};
pub use routes::{create_router, ErrorResponse};
pub use state::ServiceState;
