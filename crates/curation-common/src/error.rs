//! Error types shared across the curation pipeline.

use thiserror::Error;

/// Result type alias using CurationError.
pub type CurationResult<T> = Result<T, CurationError>;

/// Errors raised by the shared geospatial types.
#[derive(Debug, Error)]
pub enum CurationError {
    #[error("Invalid bounding box: {0}")]
    InvalidBbox(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid date allowance: pre_days={pre_days}, post_days={post_days} (must be >= 0)")]
    InvalidDateAllowance { pre_days: i64, post_days: i64 },

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),
}
