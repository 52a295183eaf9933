//! Rasterization error taxonomy. Every variant is fatal for the scene it
//! occurs on, never for the whole run.

use std::path::PathBuf;

use thiserror::Error;

pub type RasterizerResult<T> = Result<T, RasterizerError>;

#[derive(Debug, Error)]
pub enum RasterizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("class id 0 collides with the background value 0; enable set_no_data to use class 0")]
    ClassNoDataCollision,

    #[error("label geometry for {date} has zero area after reprojection to {crs}")]
    ZeroAreaGeometry { date: chrono::NaiveDate, crs: String },

    #[error("no label entries match scene {}", .0.display())]
    NoMatchingLabels(PathBuf),

    #[error("label mask {}: {}", .path.display(), .source)]
    Mask {
        path: PathBuf,
        #[source]
        source: geotiff_lite::GeoTiffError,
    },

    #[error(transparent)]
    GeoTiff(#[from] geotiff_lite::GeoTiffError),

    #[error(transparent)]
    Geo(#[from] curation_common::CurationError),
}
