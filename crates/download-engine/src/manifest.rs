//! Append-only run manifest.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineResult;

/// Final state of one (entry, source) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Matched {
        scene_id: String,
        file: PathBuf,
    },
    Unmatched {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub dataset: String,
    pub date: NaiveDate,
    pub connector: String,
    pub collection: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Outcome ledger for one run. Entries are append-only; callers serialize
/// writers (the orchestrator keeps it behind a mutex).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub started_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl RunManifest {
    pub fn new() -> Self {
        RunManifest {
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Matched { .. } => summary.matched += 1,
                Outcome::Unmatched { .. } => summary.unmatched += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    /// Persist as JSON next to the run outputs, tmp-then-rename so a
    /// concurrent reader never sees a torn file.
    pub fn persist(&self, path: &Path) -> EngineResult<()> {
        let body = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Default for RunManifest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(outcome: Outcome) -> ManifestEntry {
        ManifestEntry {
            dataset: "floods".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 8, 26).unwrap(),
            connector: "sentinel_aws".to_string(),
            collection: "sentinel-2-l2a".to_string(),
            outcome,
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut manifest = RunManifest::new();
        manifest.record(entry(Outcome::Matched {
            scene_id: "s1".to_string(),
            file: PathBuf::from("/out/a.tif"),
        }));
        manifest.record(entry(Outcome::Unmatched {
            reason: "no candidate in window".to_string(),
        }));
        manifest.record(entry(Outcome::Failed {
            error: "quota".to_string(),
        }));
        manifest.record(entry(Outcome::Unmatched {
            reason: "all candidates above cloud limit".to_string(),
        }));

        let summary = manifest.summary();
        assert_eq!(summary, RunSummary { matched: 1, unmatched: 2, failed: 1 });
    }

    #[test]
    fn test_persist_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = RunManifest::new();
        manifest.record(entry(Outcome::Unmatched {
            reason: "nothing".to_string(),
        }));
        manifest.persist(&path).unwrap();

        let loaded = RunManifest::load(&path).unwrap();
        assert_eq!(loaded.entries, manifest.entries);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
