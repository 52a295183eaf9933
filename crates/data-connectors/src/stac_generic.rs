//! Generic connector for any STAC-compliant endpoint.
//!
//! Unlike the built-in providers this connector has no registry entries:
//! collections are discovered from the endpoint and band names pass through
//! as asset keys unchanged.

use async_trait::async_trait;
use curation_common::{BoundingBox, QueryWindow};
use std::sync::Mutex;
use tracing::{instrument, warn};

use crate::error::ConnectorResult;
use crate::stac::StacClient;
use crate::types::{QueriedScene, SceneDescriptor};
use crate::{ConnectorKind, DataConnector};

pub struct StacConnector {
    stac: StacClient,
    /// Collections discovered lazily from `GET /collections`.
    cached_collections: Mutex<Option<Vec<String>>>,
}

impl StacConnector {
    pub fn new(url: &str) -> ConnectorResult<Self> {
        let token = std::env::var("STAC_API_TOKEN").ok().filter(|t| !t.is_empty());
        Ok(StacConnector {
            stac: StacClient::new(url)?.with_token(token),
            cached_collections: Mutex::new(None),
        })
    }

    async fn discover_collections(&self) -> Vec<String> {
        #[derive(serde::Deserialize)]
        struct Collections {
            #[serde(default)]
            collections: Vec<CollectionId>,
        }
        #[derive(serde::Deserialize)]
        struct CollectionId {
            id: String,
        }

        let url = format!("{}/collections", self.stac.base_url());
        let found = match reqwest::get(&url).await {
            Ok(response) => match response.json::<Collections>().await {
                Ok(body) => body.collections.into_iter().map(|c| c.id).collect(),
                Err(e) => {
                    warn!(error = %e, "failed to decode /collections");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to query /collections");
                Vec::new()
            }
        };
        if let Ok(mut cache) = self.cached_collections.lock() {
            *cache = Some(found.clone());
        }
        found
    }
}

#[async_trait]
impl DataConnector for StacConnector {
    fn id(&self) -> &str {
        ConnectorKind::Stac.as_str()
    }

    fn list_collections(&self) -> Vec<String> {
        self.cached_collections
            .lock()
            .ok()
            .and_then(|cache| cache.clone())
            .unwrap_or_default()
    }

    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        if self.list_collections().is_empty() {
            self.discover_collections().await;
        }
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
        let descriptors = self.stac.search(collection, bbox, window, None).await?;
        let band_refs: Vec<&str> = bands.iter().map(String::as_str).collect();

        let mut scenes = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            scenes.push(self.stac.fetch_scene(descriptor, &band_refs).await?);
        }
        Ok(scenes)
    }
}
