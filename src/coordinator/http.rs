//! HTTP API for the coordinator
//!
//! - `GET /register?port=P`: node heartbeat; the node address is the caller's IP plus `P`
//! - `POST /upload`: multipart upload, part `file`
//! - `GET /download/:filename`: reassembled file bytes
//! - `GET /nodes`: active node addresses
//! - `GET /files`, `GET /files/:filename`: metadata inspection
//! - `GET /health`, `GET /metrics`
//!
//! Every route answers CORS requests from any origin.

use crate::common::{node_address, validate_name, Error, METRICS};
use crate::coordinator::assembler::FileAssembler;
use crate::coordinator::metadata::MetadataStore;
use crate::coordinator::placement::PlacementPlanner;
use crate::coordinator::registry::NodeRegistry;
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub registry: Arc<NodeRegistry>,
    pub metadata: Arc<MetadataStore>,
    pub planner: Arc<PlacementPlanner>,
    pub assembler: Arc<FileAssembler>,
}

/// Browser access from any origin, echoed back with credentials allowed
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

/// Creates the HTTP router with all public endpoints.
pub fn create_router(state: CoordState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/register", get(register_node))
        .route("/upload", post(upload_file))
        .route("/download/:filename", get(download_file))
        .route("/nodes", get(active_nodes))
        .route("/files", get(list_files))
        .route("/files/:filename", get(file_metadata))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: Error) -> Response {
    (e.to_http_status(), Json(json!({ "error": e.to_string() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct RegisterQuery {
    port: Option<String>,
}

/// Register a node, or refresh it if already known
async fn register_node(
    State(state): State<CoordState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<RegisterQuery>,
) -> Response {
    let Some(port) = query.port.filter(|p| !p.is_empty()) else {
        return error_response(Error::BadRequest("Port is required".into()));
    };
    let port: u16 = match port.parse() {
        Ok(port) => port,
        Err(_) => return error_response(Error::BadRequest(format!("Invalid port: {}", port))),
    };

    let address = node_address(peer.ip(), port);
    let (address, added) = state.registry.register(&address, Instant::now());
    METRICS.node_registrations.inc();
    METRICS.active_nodes.set(state.registry.len() as u64);

    if added {
        tracing::info!(node = %address, "Registered node");
    } else {
        tracing::debug!(node = %address, "Heartbeat");
    }

    Json(json!({ "status": "registered", "node": address })).into_response()
}

/// Split the `file` part into chunks and spread them over the live nodes
async fn upload_file(State(state): State<CoordState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return error_response(Error::BadRequest("Failed to get file".into())),
            Err(e) => return error_response(Error::BadRequest(e.to_string())),
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(name) = field.file_name().map(str::to_string) else {
            return error_response(Error::BadRequest("file part has no file name".into()));
        };
        if let Err(e) = validate_name(&name) {
            return error_response(e);
        }

        let stream = field.map_err(|e| Error::Http(format!("Error reading file: {}", e)));
        return match state.planner.place_file(&name, stream).await {
            Ok(outcome) => Json(json!({
                "status": "File uploaded successfully",
                "filename": name,
                "chunks": outcome.chunk_count(),
                "failed_chunks": outcome.failed_count(),
            }))
            .into_response(),
            Err(e) => error_response(e),
        };
    }
}

async fn download_file(
    State(state): State<CoordState>,
    Path(filename): Path<String>,
) -> Response {
    match state.assembler.assemble(&filename).await {
        Ok(data) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn active_nodes(State(state): State<CoordState>) -> impl IntoResponse {
    Json(state.registry.active_addresses())
}

async fn list_files(State(state): State<CoordState>) -> impl IntoResponse {
    Json(state.metadata.list())
}

async fn file_metadata(
    State(state): State<CoordState>,
    Path(filename): Path<String>,
) -> Response {
    match state.metadata.get(&filename) {
        Some(meta) => Json(meta).into_response(),
        None => error_response(Error::FileNotFound(filename)),
    }
}

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    let now = Instant::now();
    let nodes: Vec<serde_json::Value> = state
        .registry
        .active_addresses()
        .into_iter()
        .map(|address| {
            let last_seen_ms = state
                .registry
                .last_seen_ago(&address, now)
                .map(|ago| ago.as_millis() as u64);
            json!({ "address": address, "last_seen_ms": last_seen_ms })
        })
        .collect();

    Json(json!({
        "status": "healthy",
        "active_nodes": nodes.len(),
        "nodes": nodes,
        "files": state.metadata.len(),
        "chunk_size": state.planner.chunk_size(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.to_prometheus(),
    )
}
