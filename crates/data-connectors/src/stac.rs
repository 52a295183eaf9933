//! Shared STAC API client used by the STAC-backed connectors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use curation_common::{BoundingBox, Crs, QueryWindow, RasterGrid};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{QueriedScene, SceneDescriptor};

const SEARCH_LIMIT: u32 = 100;
const HTTP_TIMEOUT_SECS: u64 = 300;

pub struct StacClient {
    base_url: String,
    client: Client,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemCollection {
    #[serde(default)]
    features: Vec<StacItem>,
}

#[derive(Debug, Deserialize)]
struct StacItem {
    id: String,
    #[serde(default)]
    bbox: Option<Vec<f64>>,
    properties: StacProperties,
    #[serde(default)]
    assets: HashMap<String, StacAsset>,
}

#[derive(Debug, Deserialize)]
struct StacProperties {
    datetime: Option<String>,
    #[serde(rename = "eo:cloud_cover")]
    cloud_cover: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StacAsset {
    href: String,
}

impl StacClient {
    pub fn new(base_url: &str) -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConnectorError::InvalidConfiguration(e.to_string()))?;
        Ok(StacClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth_token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /search and map items to descriptors. Candidates with cloud
    /// cover above the limit are dropped; unreported cloud cover is kept.
    #[instrument(skip(self), fields(url = %self.base_url, collection))]
    pub async fn search(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        let body = json!({
            "collections": [collection],
            "bbox": bbox.to_array(),
            "datetime": format!(
                "{}T00:00:00Z/{}T23:59:59Z",
                window.date_start, window.date_end
            ),
            "limit": SEARCH_LIMIT,
        });

        let mut request = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ConnectorError::Auth(format!("{}: {}", status, body)),
                429 => ConnectorError::Quota(body),
                code => ConnectorError::BadStatus { status: code, body },
            });
        }

        let items: ItemCollection = response
            .json()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))?;
        debug!(count = items.features.len(), "search returned items");

        let mut descriptors = Vec::new();
        for item in items.features {
            let acquisition = match parse_item_datetime(&item) {
                Some(dt) => dt,
                None => continue,
            };
            if let (Some(cc), Some(max)) = (item.properties.cloud_cover, max_cloud_cover) {
                if cc > max {
                    continue;
                }
            }
            let footprint = match item.bbox.as_deref() {
                Some([min_lon, min_lat, max_lon, max_lat, ..]) => {
                    BoundingBox::new(*min_lon, *min_lat, *max_lon, *max_lat)
                }
                _ => *bbox,
            };
            descriptors.push(SceneDescriptor {
                provider_id: item.id,
                collection: collection.to_string(),
                acquisition,
                cloud_cover_pct: item.properties.cloud_cover,
                footprint,
                assets: item
                    .assets
                    .into_iter()
                    .map(|(k, a)| (k, a.href))
                    .collect(),
            });
        }

        if descriptors.is_empty() {
            return Err(ConnectorError::no_data(collection, window, bbox));
        }
        Ok(descriptors)
    }

    /// Download and stack the requested band assets of one scene.
    ///
    /// All bands must share grid shape, CRS, and transform; mismatches are
    /// decode errors rather than silent resampling.
    pub async fn fetch_scene(
        &self,
        descriptor: &SceneDescriptor,
        bands: &[&str],
    ) -> ConnectorResult<QueriedScene> {
        let mut stacked: Vec<f32> = Vec::new();
        let mut grid_shape: Option<(usize, usize, Crs, curation_common::GridTransform)> = None;

        for band in bands {
            let href = descriptor.assets.get(*band).ok_or_else(|| {
                ConnectorError::Decode(format!(
                    "scene {} has no asset for band {}",
                    descriptor.provider_id, band
                ))
            })?;

            let mut request = self.client.get(href);
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(match status.as_u16() {
                    401 | 403 => ConnectorError::Auth(format!("asset fetch: {}", status)),
                    429 => ConnectorError::Quota("asset fetch".to_string()),
                    code => ConnectorError::BadStatus {
                        status: code,
                        body: href.clone(),
                    },
                });
            }
            let bytes = response.bytes().await?;
            let image = geotiff_lite::decode(&bytes)
                .map_err(|e| ConnectorError::Decode(format!("band {}: {}", band, e)))?;

            let shape = (image.width, image.height, image.crs, image.transform);
            match &grid_shape {
                None => grid_shape = Some(shape),
                Some(existing) if *existing != shape => {
                    return Err(ConnectorError::Decode(format!(
                        "band {} grid differs from previous bands",
                        band
                    )));
                }
                Some(_) => {}
            }

            match image.samples {
                geotiff_lite::SampleBuffer::F32(v) => stacked.extend(v),
                geotiff_lite::SampleBuffer::I32(v) => {
                    stacked.extend(v.into_iter().map(|s| s as f32))
                }
            }
        }

        let (width, height, crs, transform) = grid_shape.ok_or_else(|| {
            ConnectorError::Decode("no bands requested".to_string())
        })?;
        let raster = RasterGrid::new(bands.len(), width, height, crs, transform, stacked)?;

        Ok(QueriedScene {
            provider_id: descriptor.provider_id.clone(),
            collection: descriptor.collection.clone(),
            acquisition_datetime: descriptor.acquisition,
            cloud_cover_pct: descriptor.cloud_cover_pct,
            footprint: descriptor.footprint,
            raster,
        })
    }
}

fn parse_item_datetime(item: &StacItem) -> Option<DateTime<Utc>> {
    item.properties
        .datetime
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserialization() {
        let raw = r#"{
            "features": [{
                "id": "S2B_33UVT_20240827_0_L2A",
                "bbox": [14.9, 51.3, 16.5, 52.3],
                "properties": {
                    "datetime": "2024-08-27T10:06:12Z",
                    "eo:cloud_cover": 10.2
                },
                "assets": {
                    "red": {"href": "https://example.com/B04.tif"}
                }
            }]
        }"#;
        let items: ItemCollection = serde_json::from_str(raw).unwrap();
        assert_eq!(items.features.len(), 1);
        let item = &items.features[0];
        assert_eq!(item.properties.cloud_cover, Some(10.2));
        assert_eq!(
            parse_item_datetime(item).unwrap().date_naive(),
            chrono::NaiveDate::from_ymd_opt(2024, 8, 27).unwrap()
        );
    }

    #[test]
    fn test_items_without_cloud_cover_deserialize() {
        let raw = r#"{"features": [{"id": "x", "properties": {"datetime": "2024-08-27T10:06:12Z"}, "assets": {}}]}"#;
        let items: ItemCollection = serde_json::from_str(raw).unwrap();
        assert_eq!(items.features[0].properties.cloud_cover, None);
        assert_eq!(items.features[0].bbox, None);
    }
}
