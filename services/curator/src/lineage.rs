//! Per-dataset lineage file: which pipeline steps ran, when, and with what
//! parameters. Appended after each step, written whole through a temp file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub step_order: usize,
    pub started_at: DateTime<Utc>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lineage {
    pub dataset: String,
    pub steps: Vec<StepRecord>,
}

impl Lineage {
    /// Load the existing lineage for a dataset, or start a fresh one.
    pub fn load_or_new(working_dir: &Path, dataset: &str) -> Result<Self> {
        let path = lineage_path(working_dir, dataset);
        if !path.exists() {
            return Ok(Lineage {
                dataset: dataset.to_string(),
                steps: Vec::new(),
            });
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading lineage {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing lineage {}", path.display()))
    }

    pub fn record(&mut self, step: &str, parameters: Value) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            step_order: self.steps.len() + 1,
            started_at: Utc::now(),
            parameters,
        });
    }

    pub fn persist(&self, working_dir: &Path) -> Result<()> {
        let path = lineage_path(working_dir, &self.dataset);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, text)
            .with_context(|| format!("writing lineage {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming lineage into {}", path.display()))?;
        Ok(())
    }
}

pub fn lineage_path(working_dir: &Path, dataset: &str) -> PathBuf {
    working_dir.join(format!("{}_metadata.json", dataset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut lineage = Lineage::load_or_new(dir.path(), "floods").unwrap();
        lineage.record("labels", serde_json::json!({"files": 4}));
        lineage.persist(dir.path()).unwrap();

        let mut lineage = Lineage::load_or_new(dir.path(), "floods").unwrap();
        lineage.record("download", serde_json::json!({"matched": 3}));
        lineage.persist(dir.path()).unwrap();

        let reloaded = Lineage::load_or_new(dir.path(), "floods").unwrap();
        assert_eq!(reloaded.steps.len(), 2);
        assert_eq!(reloaded.steps[0].step, "labels");
        assert_eq!(reloaded.steps[1].step_order, 2);
        assert!(!lineage_path(dir.path(), "floods")
            .with_extension("json.tmp")
            .exists());
    }
}
