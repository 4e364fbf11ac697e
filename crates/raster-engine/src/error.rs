//! Error types for raster access.

use thiserror::Error;

/// Errors that can occur while opening, reading or warping rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Failed to open the raster.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read data from the raster.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// Invalid georeferencing or attribute metadata.
    #[error("invalid raster metadata: {0}")]
    InvalidMetadata(String),

    /// Band index outside `1..=band_count`.
    #[error("band {band} out of range (raster has {count} bands)")]
    InvalidBand { band: usize, count: usize },

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Projection error.
    #[error("projection error: {0}")]
    ProjectionError(String),

    /// Geometry parse error.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Region covers more raster pixels than one request may read.
    #[error("region covers {pixels} pixels, more than the limit of {limit}")]
    RegionTooLarge { pixels: u64, limit: usize },
}

impl RasterError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a StorageError.
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}

impl From<std::io::Error> for RasterError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<projection::ProjectionError> for RasterError {
    fn from(err: projection::ProjectionError) -> Self {
        Self::ProjectionError(err.to_string())
    }
}

impl From<RasterError> for stmap_common::StmapError {
    fn from(err: RasterError) -> Self {
        use stmap_common::StmapError;
        match err {
            RasterError::OpenFailed(msg)
            | RasterError::ReadFailed(msg)
            | RasterError::StorageError(msg) => StmapError::DataReadError(msg),
            RasterError::InvalidMetadata(msg) => StmapError::InvalidMetadata(msg),
            RasterError::InvalidBand { .. } => StmapError::invalid_parameter("date", err.to_string()),
            RasterError::ProjectionError(msg) => StmapError::ReprojectionFailure(msg),
            RasterError::InvalidGeometry(msg) => StmapError::invalid_parameter("region", msg),
            RasterError::RegionTooLarge { .. } => {
                StmapError::invalid_parameter("region", err.to_string())
            }
        }
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
