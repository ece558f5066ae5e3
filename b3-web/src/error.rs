//! Error types for b3-web
//!
//! Validation errors are reported without touching supervisor state.
//! Lifecycle errors are reported after the transition they occurred in has
//! completed.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for b3-web
#[derive(Error, Debug)]
pub enum Error {
    /// Action kind outside the accepted set
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Parameter name outside the persisted key set
    #[error("Invalid config key: {0}")]
    InvalidConfigKey(String),

    /// Parameter value that does not parse for its key
    #[error("Invalid value for {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    /// Request body missing, not JSON, or missing required fields
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Play requested with nothing to play
    #[error("No file given to play")]
    MissingFile,

    /// Player executable does not resolve
    #[error("Player executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// Player could not be started for another reason
    #[error("Failed to start player: {0}")]
    Spawn(#[source] std::io::Error),

    /// Player did not shut down cleanly
    #[error("Player termination failure: {0}")]
    ProcessTermination(String),

    /// Parameter store unreadable or unwritable
    #[error("Config store failure: {0}")]
    ConfigIo(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using b3-web Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Rejected input; no state was changed
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidAction(_)
                | Error::InvalidConfigKey(_)
                | Error::InvalidConfigValue { .. }
                | Error::MalformedRequest(_)
                | Error::MissingFile
        )
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<b3_common::Error> for Error {
    fn from(e: b3_common::Error) -> Self {
        match e {
            b3_common::Error::InvalidKey(key) => Error::InvalidConfigKey(key),
            b3_common::Error::InvalidValue { key, value } => {
                Error::InvalidConfigValue { key, value }
            }
            other @ (b3_common::Error::Store { .. } | b3_common::Error::Io(_)) => {
                Error::ConfigIo(other.to_string())
            }
            b3_common::Error::Config(msg) => Error::Internal(msg),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::MalformedRequest(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": self.to_string(),
        }));

        (self.status_code(), body).into_response()
    }
}
