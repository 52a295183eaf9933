//! Scene descriptor and payload types shared by all connectors.

use chrono::{DateTime, NaiveDate, Utc};
use curation_common::{BoundingBox, RasterGrid};
use std::collections::HashMap;

/// Candidate scene returned by `find_data`; metadata only, no payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescriptor {
    /// Provider-assigned scene identifier, unique within a collection.
    pub provider_id: String,
    pub collection: String,
    pub acquisition: DateTime<Utc>,
    /// Reported cloud cover percentage; providers without optical cloud
    /// screening leave this unset.
    pub cloud_cover_pct: Option<f64>,
    pub footprint: BoundingBox,
    /// Band/asset key to download URL.
    pub assets: HashMap<String, String>,
}

impl SceneDescriptor {
    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquisition.date_naive()
    }
}

/// Fetched, decoded scene data.
#[derive(Debug, Clone)]
pub struct QueriedScene {
    pub provider_id: String,
    pub collection: String,
    pub acquisition_datetime: DateTime<Utc>,
    pub cloud_cover_pct: Option<f64>,
    /// Bands stacked in the order they were requested.
    pub raster: RasterGrid,
    pub footprint: BoundingBox,
}

impl QueriedScene {
    pub fn acquisition_date(&self) -> NaiveDate {
        self.acquisition_datetime.date_naive()
    }
}
