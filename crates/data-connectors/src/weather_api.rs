//! Point weather history connector.
//!
//! Weather time series have no scene catalog and no footprint of their own:
//! `find_data` synthesizes one candidate per day and `get_data` fetches the
//! daily aggregate at the bbox centroid, gridded as a single-cell raster per
//! band so downstream stages can treat it like any other scene. Requires an
//! API key in `WEATHER_API_KEY`.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use curation_common::{BoundingBox, Crs, GridTransform, QueryWindow, RasterGrid};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

use crate::error::{ConnectorError, ConnectorResult};
use crate::registry;
use crate::types::{QueriedScene, SceneDescriptor};
use crate::{ConnectorKind, DataConnector};

const API_URL: &str = "https://api.weather.com/v3/wx/observations/historical/daily";
const KEY_ENV: &str = "WEATHER_API_KEY";

pub struct WeatherApi {
    client: Client,
    api_key: Option<String>,
}

/// Daily aggregate payload; metrics absent from the response surface as NaN
/// cells rather than errors.
#[derive(Debug, Deserialize)]
struct DailyObservation {
    temperature: Option<f64>,
    precipitation: Option<f64>,
    #[serde(rename = "windSpeed")]
    wind_speed: Option<f64>,
}

impl WeatherApi {
    pub fn new() -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ConnectorError::InvalidConfiguration(e.to_string()))?;
        Ok(WeatherApi {
            client,
            api_key: std::env::var(KEY_ENV).ok().filter(|k| !k.is_empty()),
        })
    }

    async fn fetch_day(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        date: NaiveDate,
        bands: &[&str],
        query_params: &serde_json::Map<String, serde_json::Value>,
    ) -> ConnectorResult<QueriedScene> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ConnectorError::Auth(format!("{} is not set", KEY_ENV))
        })?;

        let lat = (bbox.min_lat + bbox.max_lat) / 2.0;
        let lon = (bbox.min_lon + bbox.max_lon) / 2.0;
        let mut request = self
            .client
            .get(API_URL)
            .query(&[
                ("geocode", format!("{:.4},{:.4}", lat, lon)),
                ("date", date.format("%Y%m%d").to_string()),
                ("units", "m".to_string()),
                ("format", "json".to_string()),
                ("apiKey", key.to_string()),
            ]);
        for (k, v) in query_params {
            if let Some(s) = v.as_str() {
                request = request.query(&[(k.as_str(), s)]);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ConnectorError::Auth(body),
                429 => ConnectorError::Quota(body),
                code => ConnectorError::BadStatus { status: code, body },
            });
        }

        let observation: DailyObservation = response
            .json()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))?;

        let data: Vec<f32> = bands
            .iter()
            .map(|band| {
                let value = match *band {
                    "temperature" => observation.temperature,
                    "precipitation" => observation.precipitation,
                    "wind_speed" => observation.wind_speed,
                    _ => None,
                };
                value.map(|v| v as f32).unwrap_or(f32::NAN)
            })
            .collect();

        let transform = GridTransform::new(bbox.min_lon, bbox.max_lat, bbox.width(), bbox.height());
        let raster = RasterGrid::new(bands.len(), 1, 1, Crs::Epsg4326, transform, data)?;

        Ok(QueriedScene {
            provider_id: format!("wx_{}", date.format("%Y%m%d")),
            collection: collection.to_string(),
            acquisition_datetime: Utc
                .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap_or_default()),
            cloud_cover_pct: None,
            footprint: *bbox,
            raster,
        })
    }
}

#[async_trait]
impl DataConnector for WeatherApi {
    fn id(&self) -> &str {
        ConnectorKind::WeatherApi.as_str()
    }

    fn list_collections(&self) -> Vec<String> {
        registry::collections_for(ConnectorKind::WeatherApi)
    }

    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        _max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>> {
        registry::find_collection(ConnectorKind::WeatherApi, collection)?;

        let mut descriptors = Vec::new();
        let mut date = window.date_start;
        while date <= window.date_end {
            descriptors.push(SceneDescriptor {
                provider_id: format!("wx_{}", date.format("%Y%m%d")),
                collection: collection.to_string(),
                acquisition: Utc
                    .from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap_or_default()),
                cloud_cover_pct: None,
                footprint: *bbox,
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
        let resolved = registry::check_bands(ConnectorKind::WeatherApi, collection, bands)?;

        let mut scenes = Vec::new();
        let mut date = window.date_start;
        while date <= window.date_end {
            scenes.push(
                self.fetch_day(collection, bbox, date, &resolved, query_params)
                    .await?,
            );
            date += Duration::days(1);
        }
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_data_covers_whole_window() {
        let connector = WeatherApi::new().unwrap();
        let bbox = BoundingBox::new(0.0, 50.0, 1.0, 51.0);
        let window = QueryWindow {
            date_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        };
        let found = connector
            .find_data("historical_daily", &bbox, &window, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].provider_id, "wx_20240101");
    }

    #[test]
    fn test_observation_decodes_partial_payload() {
        let raw = r#"{"temperature": 18.5, "windSpeed": 3.1}"#;
        let obs: DailyObservation = serde_json::from_str(raw).unwrap();
        assert_eq!(obs.temperature, Some(18.5));
        assert_eq!(obs.precipitation, None);
        assert_eq!(obs.wind_speed, Some(3.1));
    }
}
