//! Label indexing: turn a directory of vector or raster label files into
//! the bbox/labels index pair the download and rasterization stages consume.
//!
//! Timestamps come from the filename (ISO `YYYY-MM-DD` or standalone
//! compact digit tokens) or from a companion `metadata.csv`; a timestamp is
//! never guessed. Class ids come from a `_CLASS_<int>_` filename token and
//! default to 1.

pub mod error;
pub mod filename;
pub mod geojson;
pub mod indexer;
pub mod metadata;

pub use error::{IndexerError, IndexerResult};
pub use filename::{extract_class, extract_date};
pub use geojson::{Feature, FeatureCollection, Geometry};
pub use indexer::{
    bbox_index_path, index_labels, labels_index_path, load_index, persist_index, BboxIndexEntry,
    GroupKey, IndexerConfig, LabelGeometry, LabelIndex, LabelMask, LabelRecord, LabelsIndexEntry,
    TimestampMode,
};
