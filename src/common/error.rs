//! Error types for minifs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Placement Errors ===
    #[error("No active storage nodes")]
    NoActiveNodes,

    #[error("Failed to push chunk {chunk_id} to {node}: {reason}")]
    ChunkPushFailed {
        node: String,
        chunk_id: String,
        reason: String,
    },

    // === Retrieval Errors ===
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Chunk {chunk_id} unavailable on {node}: {reason}")]
    ChunkUnavailable {
        node: String,
        chunk_id: String,
        reason: String,
    },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Integrity mismatch: expected {expected} bytes, reassembled {actual}")]
    IntegrityMismatch { expected: u64, actual: u64 },

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::FileNotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::NoActiveNodes => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(
            Error::NoActiveNodes.to_http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::FileNotFound("a.txt".into()).to_http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::BadRequest("port".into()).to_http_status(),
            StatusCode::BAD_REQUEST
        );
        let unavailable = Error::ChunkUnavailable {
            node: "127.0.0.1:6000".into(),
            chunk_id: "abc".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(
            unavailable.to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::IntegrityMismatch {
                expected: 7,
                actual: 3
            }
            .to_http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
