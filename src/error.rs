//! Crate-local error type and its mapping onto HTTP responses.

use http::StatusCode;

use crate::{body::CacheBody, responder::Responder, types::Response};

/// Errors that can occur while serving a single request.
///
/// Each variant carries enough information to render the status code this
/// crate's object model requires; it never carries the underlying I/O error
/// text back to the client, only to the log.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("object not found")]
    NotFound,

    #[error("object name is not valid: {0}")]
    InvalidName(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    fn status(&self) -> StatusCode {
        match self {
            CacheError::NotFound => StatusCode::NOT_FOUND,
            CacheError::InvalidName(_) => StatusCode::BAD_REQUEST,
            CacheError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            CacheError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Responder for CacheError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut res = Response::new(CacheBody::from(self.to_string()));
        *res.status_mut() = status;
        res
    }
}

/// Fatal errors that abort startup: bad CLI input, unreadable config, or a
/// TLS certificate/key pair that does not load.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to read CORS config {path}: {source}")]
    CorsConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CORS config {path}: {source}")]
    CorsConfigJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),
}
