//! Download run configuration.
//!
//! Deserialized from the run YAML and validated once before any network or
//! disk work; everything downstream receives immutable references.

use curation_common::DateAllowance;
use data_connectors::ConnectorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};

/// Optional per-run transform steps, applied in the fixed order
/// scale -> impute -> reproject.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub scale_data: bool,
    pub impute_nans: bool,
    pub reproject: bool,
}

/// One configured data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceSpec {
    pub data_connector: ConnectorKind,
    pub collection_name: String,
    /// Ordered band names; order is preserved into the output raster.
    pub bands: Vec<String>,
    /// Custom output basename; the matched date is always appended.
    #[serde(default)]
    pub save_file: Option<String>,
    /// Endpoint for the generic STAC connector.
    #[serde(default)]
    pub stac_url: Option<String>,
    /// Connector-specific pass-through, forwarded uninterpreted.
    #[serde(default)]
    pub query_params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub sources: Vec<DataSourceSpec>,
    #[serde(default)]
    pub date_allowance: DateAllowance,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default = "default_max_cloud_cover")]
    pub max_cloud_cover: f64,
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,
    pub working_dir: PathBuf,
}

fn default_max_cloud_cover() -> f64 {
    100.0
}

fn default_parallel_requests() -> usize {
    4
}

impl DownloadConfig {
    /// Static validation; fails before any I/O begins.
    pub fn validate(&self) -> EngineResult<()> {
        if self.sources.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "at least one data source is required".to_string(),
            ));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.collection_name.is_empty() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "source {}: collection_name is empty",
                    i
                )));
            }
            if source.bands.is_empty() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "source {} ({}): bands must be non-empty",
                    i, source.collection_name
                )));
            }
            if source.data_connector == ConnectorKind::Stac && source.stac_url.is_none() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "source {} ({}): generic stac connector requires stac_url",
                    i, source.collection_name
                )));
            }
        }
        self.date_allowance
            .validate()
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        if !(0.0..=100.0).contains(&self.max_cloud_cover) {
            return Err(EngineError::InvalidConfiguration(format!(
                "max_cloud_cover must be within 0..=100, got {}",
                self.max_cloud_cover
            )));
        }
        if self.parallel_requests == 0 {
            return Err(EngineError::InvalidConfiguration(
                "parallel_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DownloadConfig {
        DownloadConfig {
            sources: vec![DataSourceSpec {
                data_connector: ConnectorKind::SentinelAws,
                collection_name: "sentinel-2-l2a".to_string(),
                bands: vec!["red".to_string(), "nir".to_string()],
                save_file: None,
                stac_url: None,
                query_params: serde_json::Map::new(),
            }],
            date_allowance: DateAllowance { pre_days: 0, post_days: 21 },
            transform: TransformConfig::default(),
            max_cloud_cover: 80.0,
            parallel_requests: 4,
            working_dir: PathBuf::from("/tmp/work"),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_sources_and_bands() {
        let mut cfg = base_config();
        cfg.sources[0].bands.clear();
        assert!(cfg.validate().is_err());
        cfg.sources.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_allowance() {
        let mut cfg = base_config();
        cfg.date_allowance = DateAllowance { pre_days: -1, post_days: 0 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_cloud_cover() {
        let mut cfg = base_config();
        cfg.max_cloud_cover = 120.0;
        assert!(cfg.validate().is_err());
        cfg.max_cloud_cover = -5.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_generic_stac_requires_url() {
        let mut cfg = base_config();
        cfg.sources[0].data_connector = ConnectorKind::Stac;
        assert!(cfg.validate().is_err());
        cfg.sources[0].stac_url = Some("https://stac.example.com".to_string());
        assert!(cfg.validate().is_ok());
    }
}
