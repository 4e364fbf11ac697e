//! Error types for stmap operations.
//!
//! Every failure a caller can observe is a [`StmapError`]. The HTTP layer
//! turns it into an [`ErrorPayload`] carrying a stable kind tag and a
//! human readable message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using StmapError.
pub type StmapResult<T> = Result<T, StmapError>;

/// Primary error type for query operations.
#[derive(Debug, Error)]
pub enum StmapError {
    // === Request Errors ===
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Data Errors ===
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Reprojection failed: {0}")]
    ReprojectionFailure(String),

    #[error("Invalid asset metadata: {0}")]
    InvalidMetadata(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    // === Output Errors ===
    #[error("Failed to encode output: {0}")]
    EncodeError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl StmapError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a MissingParameter error.
    pub fn missing_parameter(param: impl Into<String>) -> Self {
        Self::MissingParameter(param.into())
    }

    /// Stable tag identifying the error kind in response payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            StmapError::UnknownOperation(_) => "UnknownOperation",
            StmapError::MissingParameter(_) | StmapError::InvalidParameter { .. } => {
                "InvalidParameters"
            }
            StmapError::AssetNotFound(_) => "AssetNotFound",
            StmapError::ReprojectionFailure(_) => "ReprojectionFailure",
            StmapError::InvalidMetadata(_) => "InvalidMetadata",
            StmapError::DataReadError(_) => "DataReadError",
            StmapError::EncodeError(_) => "EncodeError",
            StmapError::InternalError(_) => "InternalError",
            StmapError::Timeout(_) => "Timeout",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            StmapError::UnknownOperation(_)
            | StmapError::MissingParameter(_)
            | StmapError::InvalidParameter { .. }
            | StmapError::ReprojectionFailure(_) => 400,

            StmapError::AssetNotFound(_) => 404,

            StmapError::Timeout(_) => 504,

            _ => 500,
        }
    }

    /// Structured form returned to callers.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// Wire form of an error: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<std::io::Error> for StmapError {
    fn from(err: std::io::Error) -> Self {
        StmapError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for StmapError {
    fn from(err: serde_json::Error) -> Self {
        StmapError::InternalError(format!("JSON error: {}", err))
    }
}
