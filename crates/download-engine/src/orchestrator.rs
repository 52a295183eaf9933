//! Download orchestration across all (entry, source) units.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use curation_common::{QueryWindow, RasterGrid};
use data_connectors::{create_connector, registry, DataConnector, QueriedScene};
use geotiff_lite::{GeoTiffImage, SampleBuffer};
use label_indexer::{BboxIndexEntry, GroupKey, LabelIndex};

use crate::config::{DataSourceSpec, DownloadConfig};
use crate::error::{EngineError, EngineResult};
use crate::manifest::{ManifestEntry, Outcome, RunManifest};
use crate::matcher::select_scene;
use crate::transforms;

pub const MANIFEST_FILENAME: &str = "run_manifest.json";

/// One successfully written raster, for the rasterization stage.
#[derive(Debug, Clone)]
pub struct DownloadedScene {
    pub key: GroupKey,
    pub connector: String,
    pub collection: String,
    pub scene_id: String,
    pub acquisition: DateTime<Utc>,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct RunOutput {
    pub manifest: RunManifest,
    pub downloads: Vec<DownloadedScene>,
}

/// Instantiate one connector per configured source, in source order.
pub fn build_connectors(
    config: &DownloadConfig,
) -> EngineResult<Vec<Arc<dyn DataConnector>>> {
    config
        .sources
        .iter()
        .map(|source| {
            create_connector(source.data_connector, source.stac_url.as_deref())
                .map(Arc::from)
                .map_err(EngineError::from)
        })
        .collect()
}

pub struct Orchestrator {
    config: DownloadConfig,
    connectors: Vec<Arc<dyn DataConnector>>,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    /// Build with explicit connectors (one per source, same order). Used by
    /// tests to inject fakes; `with_default_connectors` is the normal path.
    pub fn new(
        config: DownloadConfig,
        connectors: Vec<Arc<dyn DataConnector>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        if connectors.len() != config.sources.len() {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} connectors for {} sources",
                connectors.len(),
                config.sources.len()
            )));
        }
        let semaphore = Arc::new(Semaphore::new(config.parallel_requests));
        Ok(Orchestrator {
            config,
            connectors,
            semaphore,
        })
    }

    pub fn with_default_connectors(config: DownloadConfig) -> EngineResult<Self> {
        let connectors = build_connectors(&config)?;
        Self::new(config, connectors)
    }

    /// Run every (entry, source) unit, bounded by `parallel_requests`.
    ///
    /// Cancellation is cooperative: units not yet started are skipped once
    /// the token fires, in-flight connector calls run to completion.
    #[instrument(skip_all, fields(entries = index.bboxes.len(), sources = self.config.sources.len()))]
    pub async fn run(
        &self,
        index: &LabelIndex,
        cancel: &CancellationToken,
    ) -> EngineResult<RunOutput> {
        std::fs::create_dir_all(&self.config.working_dir)?;

        let manifest = Arc::new(Mutex::new(RunManifest::new()));
        let downloads: Arc<Mutex<Vec<DownloadedScene>>> = Arc::new(Mutex::new(Vec::new()));
        // Sources taken out of rotation after an auth or quota failure.
        let dead_sources: Arc<std::sync::Mutex<HashSet<usize>>> =
            Arc::new(std::sync::Mutex::new(HashSet::new()));

        let units: Vec<(&BboxIndexEntry, usize)> = index
            .bboxes
            .iter()
            .flat_map(|entry| (0..self.config.sources.len()).map(move |si| (entry, si)))
            .collect();

        stream::iter(units)
            .map(|(entry, source_idx)| {
                let manifest = manifest.clone();
                let downloads = downloads.clone();
                let dead_sources = dead_sources.clone();
                let semaphore = self.semaphore.clone();
                async move {
                    if cancel.is_cancelled() {
                        debug!(date = %entry.datetime, "cancellation requested, skipping unit");
                        return;
                    }
                    if is_dead(&dead_sources, source_idx) {
                        return;
                    }
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };

                    let unit = self.process_unit(entry, source_idx).await;
                    if let Outcome::Failed { error } = &unit.outcome {
                        warn!(
                            date = %entry.datetime,
                            source = %self.config.sources[source_idx].collection_name,
                            error = %error,
                            "unit failed"
                        );
                    }
                    if unit.source_exhausted {
                        warn!(
                            source = %self.config.sources[source_idx].collection_name,
                            "source disabled for the rest of the run"
                        );
                        mark_dead(&dead_sources, source_idx);
                    }

                    let source = &self.config.sources[source_idx];
                    manifest.lock().await.record(ManifestEntry {
                        dataset: entry.key.dataset.clone(),
                        date: entry.datetime,
                        connector: source.data_connector.to_string(),
                        collection: source.collection_name.clone(),
                        outcome: unit.outcome,
                    });
                    if let Some(download) = unit.download {
                        downloads.lock().await.push(download);
                    }
                }
            })
            .buffer_unordered(self.config.parallel_requests)
            .collect::<Vec<()>>()
            .await;

        let mut manifest = Arc::try_unwrap(manifest)
            .map_err(|_| {
                EngineError::InvalidConfiguration("manifest still shared after run".to_string())
            })?
            .into_inner();
        // Completion order is nondeterministic; sort for stable output.
        manifest
            .entries
            .sort_by(|a, b| (a.date, &a.connector, &a.collection).cmp(&(b.date, &b.connector, &b.collection)));
        manifest.persist(&self.config.working_dir.join(MANIFEST_FILENAME))?;

        let mut downloads = Arc::try_unwrap(downloads)
            .map_err(|_| {
                EngineError::InvalidConfiguration("downloads still shared after run".to_string())
            })?
            .into_inner();
        downloads.sort_by(|a, b| (a.key.date, &a.connector).cmp(&(b.key.date, &b.connector)));

        let summary = manifest.summary();
        info!(
            matched = summary.matched,
            unmatched = summary.unmatched,
            failed = summary.failed,
            "download run complete"
        );
        Ok(RunOutput {
            manifest,
            downloads,
        })
    }

    /// Match, fetch, transform, and write one (entry, source) unit.
    async fn process_unit(&self, entry: &BboxIndexEntry, source_idx: usize) -> UnitResult {
        let source = &self.config.sources[source_idx];
        let connector = &self.connectors[source_idx];

        let window = match QueryWindow::from_allowance(entry.datetime, &self.config.date_allowance)
        {
            Ok(window) => window,
            Err(e) => return UnitResult::failed(e.to_string(), false),
        };

        let candidates = match connector
            .find_data(
                &source.collection_name,
                &entry.bbox,
                &window,
                Some(self.config.max_cloud_cover),
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) if e.is_no_data() => return UnitResult::unmatched(e.to_string()),
            Err(e) => return UnitResult::failed(e.to_string(), e.is_fatal_for_source()),
        };

        let selected = match select_scene(&candidates, entry.datetime, self.config.max_cloud_cover)
        {
            Some(selected) => selected.clone(),
            None => {
                return UnitResult::unmatched(format!(
                    "no candidate within cloud cover {} in {}..{}",
                    self.config.max_cloud_cover, window.date_start, window.date_end
                ))
            }
        };

        // Fetch only the matched acquisition day.
        let fetch_window = QueryWindow::single_day(selected.acquisition_date());
        let scenes = match connector
            .get_data(
                &source.collection_name,
                &entry.bbox,
                &fetch_window,
                &source.bands,
                &source.query_params,
            )
            .await
        {
            Ok(scenes) => scenes,
            Err(e) if e.is_no_data() => return UnitResult::unmatched(e.to_string()),
            Err(e) => return UnitResult::failed(e.to_string(), e.is_fatal_for_source()),
        };
        let scene = match scenes
            .iter()
            .find(|s| s.provider_id == selected.provider_id)
            .or_else(|| scenes.first())
        {
            Some(scene) => scene.clone(),
            None => {
                return UnitResult::unmatched(format!(
                    "scene {} vanished between search and fetch",
                    selected.provider_id
                ))
            }
        };

        match self.write_scene(entry, source, scene) {
            Ok(download) => UnitResult {
                outcome: Outcome::Matched {
                    scene_id: download.scene_id.clone(),
                    file: download.path.clone(),
                },
                download: Some(download),
                source_exhausted: false,
            },
            Err(e) => UnitResult::failed(e.to_string(), false),
        }
    }

    fn write_scene(
        &self,
        entry: &BboxIndexEntry,
        source: &DataSourceSpec,
        scene: QueriedScene,
    ) -> EngineResult<DownloadedScene> {
        let factors = registry::scale_factors(
            source.data_connector,
            &source.collection_name,
            &source.bands,
        );
        let raster = transforms::apply(scene.raster, &self.config.transform, &factors)?;

        let path = output_path(
            &self.config.working_dir,
            source,
            scene.acquisition_datetime.date_naive(),
        );
        write_raster_atomic(&path, &raster)?;
        debug!(file = %path.display(), scene = %scene.provider_id, "raster written");

        Ok(DownloadedScene {
            key: entry.key.clone(),
            connector: source.data_connector.to_string(),
            collection: source.collection_name.clone(),
            scene_id: scene.provider_id,
            acquisition: scene.acquisition_datetime,
            path,
        })
    }
}

/// `{working_dir}/{connector}_{collection}_{date}.tif`, or
/// `{save_file}_{date}.tif` when a custom basename is configured.
pub fn output_path(working_dir: &Path, source: &DataSourceSpec, date: NaiveDate) -> PathBuf {
    let stem = match &source.save_file {
        Some(name) => name.clone(),
        None => format!("{}_{}", source.data_connector, source.collection_name),
    };
    working_dir.join(format!("{}_{}.tif", stem, date.format("%Y-%m-%d")))
}

/// Write through a unique temp file and rename, so a concurrently running
/// rasterization step never reads a partial raster.
fn write_raster_atomic(path: &Path, raster: &RasterGrid) -> EngineResult<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tif.{}.{}.partial", std::process::id(), n));

    let image = GeoTiffImage::new(
        raster.width,
        raster.height,
        raster.bands,
        raster.crs,
        raster.transform,
        None,
        SampleBuffer::F32(raster.data.clone()),
    )?;
    geotiff_lite::write_file(&tmp, &image)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

struct UnitResult {
    outcome: Outcome,
    download: Option<DownloadedScene>,
    source_exhausted: bool,
}

impl UnitResult {
    fn unmatched(reason: String) -> Self {
        UnitResult {
            outcome: Outcome::Unmatched { reason },
            download: None,
            source_exhausted: false,
        }
    }

    fn failed(error: String, source_exhausted: bool) -> Self {
        UnitResult {
            outcome: Outcome::Failed { error },
            download: None,
            source_exhausted,
        }
    }
}

fn is_dead(dead: &std::sync::Mutex<HashSet<usize>>, source_idx: usize) -> bool {
    dead.lock().map(|set| set.contains(&source_idx)).unwrap_or(false)
}

fn mark_dead(dead: &std::sync::Mutex<HashSet<usize>>, source_idx: usize) {
    if let Ok(mut set) = dead.lock() {
        set.insert(source_idx);
    }
}
