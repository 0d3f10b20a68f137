//! HTTP API for a storage node
//!
//! - `POST /upload-chunk`: multipart fields `filename`, `chunkid` and file part `chunk`
//! - `GET /download-chunk?filename=&chunkid=`: chunk bytes or 404
//! - `GET /list`: names of files with chunks on this node

use crate::common::{verify_chunk, Error};
use crate::node::store::ChunkStore;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct NodeState {
    pub store: Arc<ChunkStore>,
}

pub fn create_router(state: NodeState, max_chunk_bytes: usize) -> Router {
    Router::new()
        .route("/upload-chunk", post(upload_chunk))
        .route("/download-chunk", get(download_chunk))
        .route("/list", get(list_files))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(e: Error) -> Response {
    (e.to_http_status(), Json(json!({ "error": e.to_string() }))).into_response()
}

async fn upload_chunk(State(state): State<NodeState>, mut multipart: Multipart) -> Response {
    let mut file_name = None;
    let mut chunk_id = None;
    let mut data: Option<Bytes> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(Error::BadRequest(e.to_string())),
        };
        let name = field.name().unwrap_or_default().to_string();
        let value = match field.bytes().await {
            Ok(value) => value,
            Err(e) => return error_response(Error::BadRequest(e.to_string())),
        };
        match name.as_str() {
            "filename" => file_name = Some(String::from_utf8_lossy(&value).into_owned()),
            "chunkid" => chunk_id = Some(String::from_utf8_lossy(&value).into_owned()),
            "chunk" => data = Some(value),
            _ => {}
        }
    }

    let (Some(file_name), Some(chunk_id), Some(data)) = (file_name, chunk_id, data) else {
        return error_response(Error::BadRequest(
            "filename, chunkid and chunk are required".into(),
        ));
    };

    // A chunk id is the digest of its bytes; refuse anything else
    if let Err(e) = verify_chunk(&data, &chunk_id) {
        return error_response(Error::BadRequest(e.to_string()));
    }

    match state.store.put(&file_name, &chunk_id, &data).await {
        Ok(()) => {
            tracing::info!(file = %file_name, chunk = %chunk_id, size = data.len(), "Stored chunk");
            Json(json!({ "status": "stored" })).into_response()
        }
        Err(e) => {
            tracing::error!(file = %file_name, chunk = %chunk_id, error = %e, "Failed to store chunk");
            error_response(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkQuery {
    filename: String,
    chunkid: String,
}

async fn download_chunk(
    State(state): State<NodeState>,
    Query(query): Query<ChunkQuery>,
) -> Response {
    match state.store.get(&query.filename, &query.chunkid).await {
        Ok(Some(data)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Chunk not found").into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_files(State(state): State<NodeState>) -> Response {
    match state.store.list_files().await {
        Ok(files) => Json(files).into_response(),
        Err(e) => error_response(e),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}
