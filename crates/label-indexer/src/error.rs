//! Error types for label indexing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No parsable date in filename: {0}")]
    TimestampParse(String),

    #[error("Missing metadata for {filename}: {reason}")]
    MissingMetadata { filename: String, reason: String },

    #[error("Malformed metadata.csv at {}: {}", .path.display(), .reason)]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("Invalid GeoJSON in {}: {}", .path.display(), .reason)]
    InvalidGeoJson { path: PathBuf, reason: String },

    #[error("Invalid raster label {}: {}", .path.display(), .source)]
    InvalidRaster {
        path: PathBuf,
        #[source]
        source: geotiff_lite::GeoTiffError,
    },

    #[error("Unsupported label file type: {}", .0.display())]
    UnsupportedLabelType(PathBuf),

    #[error("Labels folder not found or empty: {}", .0.display())]
    EmptyLabelsFolder(PathBuf),

    #[error(transparent)]
    Geo(#[from] curation_common::CurationError),
}
