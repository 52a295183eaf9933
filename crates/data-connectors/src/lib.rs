//! Provider adapters for remote geospatial data sources.
//!
//! Every provider implements the three-method [`DataConnector`] contract
//! (`list_collections` / `find_data` / `get_data`); the download engine
//! dispatches through `Box<dyn DataConnector>` and never branches on
//! provider identity.

pub mod climate_data_store;
pub mod cordex;
pub mod error;
pub mod nasa_earthdata;
pub mod registry;
pub mod sentinel_aws;
pub mod stac;
pub mod stac_generic;
pub mod types;
pub mod weather_api;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use curation_common::{BoundingBox, QueryWindow};
use serde::{Deserialize, Serialize};

pub use error::{ConnectorError, ConnectorResult};
pub use types::{QueriedScene, SceneDescriptor};

/// Capability contract every provider adapter implements.
///
/// Queries must be idempotent: repeating an identical call returns the same
/// candidates (modulo catalog changes upstream).
#[async_trait]
pub trait DataConnector: Send + Sync {
    /// Stable connector identifier, used in output filenames.
    fn id(&self) -> &str;

    /// Collection identifiers this connector serves.
    fn list_collections(&self) -> Vec<String>;

    /// Search for candidate scenes; descriptors only, no payload.
    async fn find_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        max_cloud_cover: Option<f64>,
    ) -> ConnectorResult<Vec<SceneDescriptor>>;

    /// Fetch gridded data for the given bands. `query_params` is an opaque
    /// provider-specific pass-through, forwarded uninterpreted.
    async fn get_data(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        window: &QueryWindow,
        bands: &[String],
        query_params: &serde_json::Map<String, serde_json::Value>,
    ) -> ConnectorResult<Vec<QueriedScene>>;
}

/// The set of known connector names, validated at configuration load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    SentinelAws,
    NasaEarthdata,
    Stac,
    ClimateDataStore,
    WeatherApi,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 5] = [
        ConnectorKind::SentinelAws,
        ConnectorKind::NasaEarthdata,
        ConnectorKind::Stac,
        ConnectorKind::ClimateDataStore,
        ConnectorKind::WeatherApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::SentinelAws => "sentinel_aws",
            ConnectorKind::NasaEarthdata => "nasa_earthdata",
            ConnectorKind::Stac => "stac",
            ConnectorKind::ClimateDataStore => "climate_data_store",
            ConnectorKind::WeatherApi => "weather_api",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectorKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| ConnectorError::UnknownConnector(s.to_string()))
    }
}

/// Instantiate a connector by kind. `stac_url` applies to the generic STAC
/// connector only.
pub fn create_connector(
    kind: ConnectorKind,
    stac_url: Option<&str>,
) -> ConnectorResult<Box<dyn DataConnector>> {
    Ok(match kind {
        ConnectorKind::SentinelAws => Box::new(sentinel_aws::SentinelAws::new()?),
        ConnectorKind::NasaEarthdata => Box::new(nasa_earthdata::NasaEarthdata::new()?),
        ConnectorKind::Stac => {
            let url = stac_url.ok_or_else(|| {
                ConnectorError::InvalidConfiguration(
                    "generic stac connector requires a stac_url".to_string(),
                )
            })?;
            Box::new(stac_generic::StacConnector::new(url)?)
        }
        ConnectorKind::ClimateDataStore => {
            Box::new(climate_data_store::ClimateDataStore::new()?)
        }
        ConnectorKind::WeatherApi => Box::new(weather_api::WeatherApi::new()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in ConnectorKind::ALL {
            assert_eq!(kind.as_str().parse::<ConnectorKind>().unwrap(), kind);
        }
        assert!(matches!(
            "sentinelhub".parse::<ConnectorKind>(),
            Err(ConnectorError::UnknownConnector(_))
        ));
    }

    #[test]
    fn test_generic_stac_requires_url() {
        assert!(matches!(
            create_connector(ConnectorKind::Stac, None),
            Err(ConnectorError::InvalidConfiguration(_))
        ));
    }
}
