//! Harmonized Landsat Sentinel (HLS) data from the NASA CMR STAC catalog.
//!
//! Asset downloads require an Earthdata bearer token, read from the
//! `EARTHDATA_TOKEN` environment variable. Search works without one.

use async_trait::async_trait;
use curation_common::{BoundingBox, QueryWindow};
use tracing::instrument;

use crate::error::{ConnectorError, ConnectorResult};
use crate::registry;
use crate::stac::StacClient;
use crate::types::{QueriedScene, SceneDescriptor};
use crate::{ConnectorKind, DataConnector};

const CMR_STAC_URL: &str = "https://cmr.earthdata.nasa.gov/stac/LPCLOUD";
const TOKEN_ENV: &str = "EARTHDATA_TOKEN";

pub struct NasaEarthdata {
    stac: StacClient,
    has_token: bool,
}

impl NasaEarthdata {
    pub fn new() -> ConnectorResult<Self> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        let has_token = token.is_some();
        Ok(NasaEarthdata {
            stac: StacClient::new(CMR_STAC_URL)?.with_token(token),
            has_token,
        })
    }
}

#[async_trait]
impl DataConnector for NasaEarthdata {
    fn id(&self) -> &str {
        ConnectorKind::NasaEarthdata.as_str()
    }

    fn list_collections(&self) -> Vec<String> {
        registry::collections_for(ConnectorKind::NasaEarthdata)
    }

    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        registry::find_collection(ConnectorKind::NasaEarthdata, collection)?;
        self.stac.search(collection, bbox, window, max_cloud_cover).await
    }

    #[instrument(skip(self, query_params), fields(collection))]
    async fn get_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        bands: &[String],
        query_params: &serde_json::Map<String, serde_json::Value>,
    ) -> ConnectorResult<Vec<QueriedScene>> {
        let _ = query_params;
        if !self.has_token {
            return Err(ConnectorError::Auth(format!(
                "{} is not set; Earthdata downloads require a bearer token",
                TOKEN_ENV
            )));
        }
        let resolved = registry::check_bands(ConnectorKind::NasaEarthdata, collection, bands)?;
        let descriptors = self.stac.search(collection, bbox, window, None).await?;

        let mut scenes = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            scenes.push(self.stac.fetch_scene(descriptor, &resolved).await?);
        }
        Ok(scenes)
    }
}
