//! Date-bbox matching and download orchestration.
//!
//! Drives the configured data sources across every bbox index entry:
//! compute the query window, search, pick the best candidate scene, fetch
//! and transform it, and write one raster per (source, matched date) with a
//! temp-then-rename discipline. Every (entry, source) outcome lands in the
//! run manifest.

pub mod config;
pub mod error;
pub mod manifest;
pub mod matcher;
pub mod orchestrator;
pub mod transforms;

pub use config::{DataSourceSpec, DownloadConfig, TransformConfig};
pub use error::{EngineError, EngineResult};
pub use manifest::{ManifestEntry, Outcome, RunManifest, RunSummary};
pub use matcher::select_scene;
pub use orchestrator::{build_connectors, DownloadedScene, Orchestrator, RunOutput};
