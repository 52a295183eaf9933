//! Sentinel data from the AWS earth-search STAC catalog.

use async_trait::async_trait;
use curation_common::{BoundingBox, QueryWindow};
use tracing::instrument;

use crate::error::ConnectorResult;
use crate::registry;
use crate::stac::StacClient;
use crate::types::{QueriedScene, SceneDescriptor};
use crate::{ConnectorKind, DataConnector};

const EARTH_SEARCH_URL: &str = "https://earth-search.aws.element84.com/v1";

pub struct SentinelAws {
    stac: StacClient,
}

impl SentinelAws {
    pub fn new() -> ConnectorResult<Self> {
        Ok(SentinelAws {
            stac: StacClient::new(EARTH_SEARCH_URL)?,
        })
    }
}

#[async_trait]
impl DataConnector for SentinelAws {
    fn id(&self) -> &str {
        ConnectorKind::SentinelAws.as_str()
    }

    fn list_collections(&self) -> Vec<String> {
        registry::collections_for(ConnectorKind::SentinelAws)
    }

    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        registry::find_collection(ConnectorKind::SentinelAws, collection)?;
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
        let resolved = registry::check_bands(ConnectorKind::SentinelAws, collection, bands)?;
        let descriptors = self.stac.search(collection, bbox, window, None).await?;

        let mut scenes = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            scenes.push(self.stac.fetch_scene(descriptor, &resolved).await?);
        }
        Ok(scenes)
    }
}
