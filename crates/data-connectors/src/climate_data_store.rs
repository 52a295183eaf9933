//! Copernicus Climate Data Store (CDS) connector for CORDEX products.
//!
//! CDS has no scene search: model output exists for every day of a product's
//! span, so `find_data` synthesizes one candidate per day in the query
//! window, mapped onto the smallest CORDEX domain covering the bbox. Cloud
//! cover is never reported. Retrieval needs an API key in `CDS_API_KEY`.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use curation_common::{BoundingBox, QueryWindow};
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::cordex;
use crate::error::{ConnectorError, ConnectorResult};
use crate::registry;
use crate::types::{QueriedScene, SceneDescriptor};
use crate::{ConnectorKind, DataConnector};

const CDS_API_URL: &str = "https://cds.climate.copernicus.eu/api/retrieve/v1";
const KEY_ENV: &str = "CDS_API_KEY";

pub struct ClimateDataStore {
    client: Client,
    api_key: Option<String>,
}

impl ClimateDataStore {
    pub fn new() -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .map_err(|e| ConnectorError::InvalidConfiguration(e.to_string()))?;
        Ok(ClimateDataStore {
            client,
            api_key: std::env::var(KEY_ENV).ok().filter(|k| !k.is_empty()),
        })
    }

    fn require_key(&self) -> ConnectorResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ConnectorError::Auth(format!("{} is not set; CDS retrieval needs an API key", KEY_ENV))
        })
    }

    async fn retrieve_day(
        &self,
        collection: &str,
        domain: &cordex::CordexDomain,
        date: NaiveDate,
        bands: &[&str],
        query_params: &serde_json::Map<String, serde_json::Value>,
    ) -> ConnectorResult<QueriedScene> {
        let key = self.require_key()?;

        let mut body = json!({
            "variable": bands,
            "domain": domain.code,
            "date": date.format("%Y-%m-%d").to_string(),
            "format": "geotiff",
        });
        // Opaque pass-through, forwarded uninterpreted.
        if let Some(map) = body.as_object_mut() {
            for (k, v) in query_params {
                map.insert(k.clone(), v.clone());
            }
        }

        let url = format!("{}/processes/{}/execute", CDS_API_URL, collection);
        debug!(%url, domain = domain.code, %date, "submitting CDS retrieval");
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ConnectorError::Auth(text),
                429 => ConnectorError::Quota(text),
                code => ConnectorError::BadStatus { status: code, body: text },
            });
        }

        let bytes = response.bytes().await?;
        let image = geotiff_lite::decode(&bytes)
            .map_err(|e| ConnectorError::Decode(e.to_string()))?;
        let samples = match image.samples {
            geotiff_lite::SampleBuffer::F32(v) => v,
            geotiff_lite::SampleBuffer::I32(v) => v.into_iter().map(|s| s as f32).collect(),
        };
        let raster = curation_common::RasterGrid::new(
            image.bands,
            image.width,
            image.height,
            image.crs,
            image.transform,
            samples,
        )?;

        Ok(QueriedScene {
            provider_id: scene_id(domain, date),
            collection: collection.to_string(),
            acquisition_datetime: Utc
                .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap_or_default()),
            cloud_cover_pct: None,
            footprint: domain.bbox,
            raster,
        })
    }
}

fn scene_id(domain: &cordex::CordexDomain, date: NaiveDate) -> String {
    format!("{}_{}", domain.code, date.format("%Y%m%d"))
}

#[async_trait]
impl DataConnector for ClimateDataStore {
    fn id(&self) -> &str {
        ConnectorKind::ClimateDataStore.as_str()
    }

    fn list_collections(&self) -> Vec<String> {
        registry::collections_for(ConnectorKind::ClimateDataStore)
    }

    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        _max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        registry::find_collection(ConnectorKind::ClimateDataStore, collection)?;
        let domain = cordex::best_domain(bbox)
            .ok_or_else(|| ConnectorError::no_data(collection, window, bbox))?;

        let mut descriptors = Vec::new();
        let mut date = window.date_start;
        while date <= window.date_end {
            descriptors.push(SceneDescriptor {
                provider_id: scene_id(domain, date),
                collection: collection.to_string(),
                acquisition: Utc
                    .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap_or_default()),
                cloud_cover_pct: None,
                footprint: domain.bbox,
                assets: HashMap::new(),
            });
            date += Duration::days(1);
        }
        Ok(descriptors)
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
        let resolved = registry::check_bands(ConnectorKind::ClimateDataStore, collection, bands)?;
        let domain = cordex::best_domain(bbox)
            .ok_or_else(|| ConnectorError::no_data(collection, window, bbox))?;

        let mut scenes = Vec::new();
        let mut date = window.date_start;
        while date <= window.date_end {
            scenes.push(
                self.retrieve_day(collection, domain, date, &resolved, query_params)
                    .await?,
            );
            date += Duration::days(1);
        }
        Ok(scenes)
    }
}
