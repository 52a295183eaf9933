//! Error types for the download engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Geo(#[from] curation_common::CurationError),

    #[error("Raster write failed: {0}")]
    GeoTiff(#[from] geotiff_lite::GeoTiffError),

    #[error(transparent)]
    Connector(#[from] data_connectors::ConnectorError),
}
