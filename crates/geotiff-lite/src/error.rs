//! Error types for GeoTIFF encode and decode.

use thiserror::Error;

/// Result type for GeoTIFF operations.
pub type GeoTiffResult<T> = Result<T, GeoTiffError>;

#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Not a TIFF file: {0}")]
    NotTiff(String),

    #[error("Unsupported TIFF feature: {0}")]
    Unsupported(String),

    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("Malformed tag {tag}: {reason}")]
    MalformedTag { tag: u16, reason: String },

    #[error("Truncated file: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        needed: usize,
        offset: usize,
        available: usize,
    },

    #[error("Invalid CRS in GeoKey directory: {0}")]
    InvalidCrs(#[from] curation_common::CurationError),
}
