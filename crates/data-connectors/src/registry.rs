//! Built-in collections registry.
//!
//! Backs `list_collections`, band alias resolution, and the per-band scaling
//! factors applied by the download transform stage.

use crate::error::{ConnectorError, ConnectorResult};
use crate::ConnectorKind;

pub struct BandInfo {
    /// Canonical asset key used when fetching.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Multiplier converting stored digital numbers to physical values.
    pub scale_factor: f64,
}

pub struct CollectionInfo {
    pub name: &'static str,
    pub connector: ConnectorKind,
    pub bands: &'static [BandInfo],
}

/// Static catalog of the collections the built-in connectors serve.
pub static COLLECTIONS: &[CollectionInfo] = &[
    CollectionInfo {
        name: "sentinel-2-l2a",
        connector: ConnectorKind::SentinelAws,
        bands: &[
            BandInfo { name: "blue", aliases: &["B02", "b02"], scale_factor: 0.0001 },
            BandInfo { name: "green", aliases: &["B03", "b03"], scale_factor: 0.0001 },
            BandInfo { name: "red", aliases: &["B04", "b04"], scale_factor: 0.0001 },
            BandInfo { name: "nir", aliases: &["B08", "b08"], scale_factor: 0.0001 },
            BandInfo { name: "swir16", aliases: &["B11", "b11"], scale_factor: 0.0001 },
            BandInfo { name: "swir22", aliases: &["B12", "b12"], scale_factor: 0.0001 },
            BandInfo { name: "scl", aliases: &["SCL"], scale_factor: 1.0 },
        ],
    },
    CollectionInfo {
        name: "sentinel-1-grd",
        connector: ConnectorKind::SentinelAws,
        bands: &[
            BandInfo { name: "vv", aliases: &["VV"], scale_factor: 1.0 },
            BandInfo { name: "vh", aliases: &["VH"], scale_factor: 1.0 },
        ],
    },
    CollectionInfo {
        name: "HLSS30.v2.0",
        connector: ConnectorKind::NasaEarthdata,
        bands: &[
            BandInfo { name: "B02", aliases: &["blue"], scale_factor: 0.0001 },
            BandInfo { name: "B03", aliases: &["green"], scale_factor: 0.0001 },
            BandInfo { name: "B04", aliases: &["red"], scale_factor: 0.0001 },
            BandInfo { name: "B8A", aliases: &["nir"], scale_factor: 0.0001 },
            BandInfo { name: "B11", aliases: &["swir16"], scale_factor: 0.0001 },
            BandInfo { name: "B12", aliases: &["swir22"], scale_factor: 0.0001 },
            BandInfo { name: "Fmask", aliases: &["fmask"], scale_factor: 1.0 },
        ],
    },
    CollectionInfo {
        name: "HLSL30.v2.0",
        connector: ConnectorKind::NasaEarthdata,
        bands: &[
            BandInfo { name: "B02", aliases: &["blue"], scale_factor: 0.0001 },
            BandInfo { name: "B03", aliases: &["green"], scale_factor: 0.0001 },
            BandInfo { name: "B04", aliases: &["red"], scale_factor: 0.0001 },
            BandInfo { name: "B05", aliases: &["nir"], scale_factor: 0.0001 },
            BandInfo { name: "B06", aliases: &["swir16"], scale_factor: 0.0001 },
            BandInfo { name: "B07", aliases: &["swir22"], scale_factor: 0.0001 },
            BandInfo { name: "Fmask", aliases: &["fmask"], scale_factor: 1.0 },
        ],
    },
    CollectionInfo {
        name: "reanalysis-cordex-single-levels",
        connector: ConnectorKind::ClimateDataStore,
        bands: &[
            BandInfo { name: "2m_air_temperature", aliases: &["tas", "t2m"], scale_factor: 1.0 },
            BandInfo { name: "mean_precipitation_flux", aliases: &["pr"], scale_factor: 1.0 },
            BandInfo { name: "10m_wind_speed", aliases: &["sfcWind"], scale_factor: 1.0 },
        ],
    },
    CollectionInfo {
        name: "historical_daily",
        connector: ConnectorKind::WeatherApi,
        bands: &[
            BandInfo { name: "temperature", aliases: &["temp"], scale_factor: 1.0 },
            BandInfo { name: "precipitation", aliases: &["precip"], scale_factor: 1.0 },
            BandInfo { name: "wind_speed", aliases: &["wind"], scale_factor: 1.0 },
        ],
    },
];

/// Collection names served by one connector.
pub fn collections_for(kind: ConnectorKind) -> Vec<String> {
    COLLECTIONS
        .iter()
        .filter(|c| c.connector == kind)
        .map(|c| c.name.to_string())
        .collect()
}

pub fn find_collection(kind: ConnectorKind, name: &str) -> ConnectorResult<&'static CollectionInfo> {
    COLLECTIONS
        .iter()
        .find(|c| c.connector == kind && c.name == name)
        .ok_or_else(|| ConnectorError::UnknownCollection {
            connector: kind.to_string(),
            collection: name.to_string(),
        })
}

/// Resolve requested band names (canonical or alias) to canonical asset keys,
/// preserving request order.
pub fn check_bands(
    kind: ConnectorKind,
    collection: &str,
    bands: &[String],
) -> ConnectorResult<Vec<&'static str>> {
    let info = find_collection(kind, collection)?;
    bands
        .iter()
        .map(|requested| {
            info.bands
                .iter()
                .find(|b| b.name == requested || b.aliases.contains(&requested.as_str()))
                .map(|b| b.name)
                .ok_or_else(|| ConnectorError::BandNotAvailable {
                    collection: collection.to_string(),
                    band: requested.clone(),
                    available: info
                        .bands
                        .iter()
                        .map(|b| b.name)
                        .collect::<Vec<_>>()
                        .join(", "),
                })
        })
        .collect()
}

/// Per-band scale factors for the requested bands, in request order. Unknown
/// collections fall back to 1.0 (the generic STAC connector has no registry
/// entries).
pub fn scale_factors(kind: ConnectorKind, collection: &str, bands: &[String]) -> Vec<f64> {
    let info = match COLLECTIONS
        .iter()
        .find(|c| c.connector == kind && c.name == collection)
    {
        Some(info) => info,
        None => return vec![1.0; bands.len()],
    };
    bands
        .iter()
        .map(|requested| {
            info.bands
                .iter()
                .find(|b| b.name == requested || b.aliases.contains(&requested.as_str()))
                .map(|b| b.scale_factor)
                .unwrap_or(1.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_for_kind() {
        let s2 = collections_for(ConnectorKind::SentinelAws);
        assert!(s2.contains(&"sentinel-2-l2a".to_string()));
        assert!(!s2.contains(&"HLSS30.v2.0".to_string()));
    }

    #[test]
    fn test_check_bands_resolves_aliases_in_order() {
        let bands = vec!["B04".to_string(), "nir".to_string(), "blue".to_string()];
        let resolved =
            check_bands(ConnectorKind::SentinelAws, "sentinel-2-l2a", &bands).unwrap();
        assert_eq!(resolved, vec!["red", "nir", "blue"]);
    }

    #[test]
    fn test_check_bands_rejects_unknown_band() {
        let bands = vec!["thermal".to_string()];
        assert!(matches!(
            check_bands(ConnectorKind::SentinelAws, "sentinel-2-l2a", &bands),
            Err(ConnectorError::BandNotAvailable { .. })
        ));
    }

    #[test]
    fn test_unknown_collection() {
        assert!(matches!(
            check_bands(ConnectorKind::SentinelAws, "landsat-c2-l2", &[]),
            Err(ConnectorError::UnknownCollection { .. })
        ));
    }

    #[test]
    fn test_scale_factors() {
        let bands = vec!["red".to_string(), "scl".to_string()];
        assert_eq!(
            scale_factors(ConnectorKind::SentinelAws, "sentinel-2-l2a", &bands),
            vec![0.0001, 1.0]
        );
        // No registry entry: identity scaling
        assert_eq!(
            scale_factors(ConnectorKind::Stac, "anything", &bands),
            vec![1.0, 1.0]
        );
    }
}
