//! Run configuration loaded from a YAML file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use curation_common::DateAllowance;
use download_engine::{DataSourceSpec, DownloadConfig, TransformConfig};
use label_indexer::{IndexerConfig, TimestampMode};
use serde::{Deserialize, Serialize};

/// Top-level curation run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Folder of label files to index.
    pub labels_dir: PathBuf,

    /// Where label timestamps come from.
    #[serde(default)]
    pub timestamp_mode: TimestampMode,

    /// Abort indexing on the first bad label file instead of skipping it.
    #[serde(default)]
    pub strict: bool,

    /// Data sources queried for every index entry.
    pub sources: Vec<DataSourceSpec>,

    /// Days of slack around each label date, both sides inclusive.
    #[serde(default)]
    pub date_allowance: DateAllowance,

    #[serde(default)]
    pub transform: TransformConfig,

    /// Maximum reported cloud cover percentage; scenes without a report
    /// always pass.
    #[serde(default = "default_max_cloud_cover")]
    pub max_cloud_cover: f64,

    /// Concurrent provider requests.
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,

    /// Use -1 as the label-raster background so class 0 stays usable.
    #[serde(default)]
    pub set_no_data: bool,

    /// Keep the intermediate geometry index files after a full run.
    #[serde(default = "default_keep_files")]
    pub keep_files: bool,
}

fn default_max_cloud_cover() -> f64 {
    100.0
}

fn default_parallel_requests() -> usize {
    4
}

fn default_keep_files() -> bool {
    true
}

impl CuratorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: CuratorConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn indexer_config(&self, dataset_name: &str) -> IndexerConfig {
        IndexerConfig {
            dataset_name: dataset_name.to_string(),
            labels_dir: self.labels_dir.clone(),
            timestamp_mode: self.timestamp_mode,
            strict: self.strict,
        }
    }

    pub fn download_config(&self, working_dir: &Path) -> DownloadConfig {
        DownloadConfig {
            sources: self.sources.clone(),
            date_allowance: self.date_allowance,
            transform: self.transform,
            max_cloud_cover: self.max_cloud_cover,
            parallel_requests: self.parallel_requests,
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_connectors::ConnectorKind;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = r#"
labels_dir: /data/labels
sources:
  - data_connector: sentinel_aws
    collection_name: sentinel-2-l2a
    bands: [red, green, blue]
"#;
        let config: CuratorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_cloud_cover, 100.0);
        assert_eq!(config.parallel_requests, 4);
        assert!(!config.set_no_data);
        assert!(config.keep_files);
        assert_eq!(config.sources[0].data_connector, ConnectorKind::SentinelAws);
        assert!(config
            .download_config(Path::new("/tmp/run"))
            .validate()
            .is_ok());
    }

    #[test]
    fn negative_allowance_fails_validation() {
        let yaml = r#"
labels_dir: /data/labels
date_allowance: { pre_days: -1, post_days: 3 }
sources:
  - data_connector: sentinel_aws
    collection_name: sentinel-2-l2a
    bands: [red]
"#;
        let config: CuratorConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config
            .download_config(Path::new("/tmp/run"))
            .validate()
            .is_err());
    }
}
