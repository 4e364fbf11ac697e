//! Error types for spatial reference handling.

use thiserror::Error;

/// Errors raised while parsing or using a spatial reference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The `srs_type` tag is not one we know how to read.
    #[error("unsupported spatial reference type: {0}")]
    UnsupportedType(String),

    /// The EPSG code is valid but not one of the supported references.
    #[error("unsupported EPSG code: {0}")]
    UnsupportedEpsg(u32),

    /// The definition could not be understood.
    #[error("unrecognised spatial reference definition: {0}")]
    Unrecognised(String),
}

impl ProjectionError {
    pub fn unrecognised(definition: &str) -> Self {
        // Long WKT strings make unreadable log lines
        let mut shown: String = definition.chars().take(80).collect();
        if definition.chars().count() > 80 {
            shown.push_str("...");
        }
        Self::Unrecognised(shown)
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
