//! Pipeline steps behind the CLI subcommands. Each step records itself in
//! the dataset lineage file after it completes.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use curation_common::BoundingBox;
use download_engine::{DownloadedScene, Orchestrator, RunOutput};
use geotiff_lite::GeoTiffImage;
use label_indexer::{index_labels, load_index, persist_index, LabelIndex};
use rasterizer::{rasterize_batch, RasterizeOptions, ScenePairing};

use crate::config::CuratorConfig;
use crate::lineage::Lineage;

pub struct PipelineContext {
    pub dataset_name: String,
    pub working_dir: PathBuf,
    pub config: CuratorConfig,
}

impl PipelineContext {
    fn record_step(&self, step: &str, parameters: serde_json::Value) -> Result<()> {
        let mut lineage = Lineage::load_or_new(&self.working_dir, &self.dataset_name)?;
        lineage.record(step, parameters);
        lineage.persist(&self.working_dir)
    }
}

/// Index the labels folder and persist both geometry index files.
pub fn run_labels(ctx: &PipelineContext) -> Result<LabelIndex> {
    let indexer_config = ctx.config.indexer_config(&ctx.dataset_name);
    let index = index_labels(&indexer_config)
        .with_context(|| format!("indexing labels in {}", ctx.config.labels_dir.display()))?;
    persist_index(&index, &ctx.working_dir, &ctx.dataset_name)?;
    info!(
        entries = index.bboxes.len(),
        labels = index.labels.len(),
        "label index written"
    );
    ctx.record_step(
        "labels",
        serde_json::json!({
            "labels_dir": ctx.config.labels_dir,
            "timestamp_mode": ctx.config.timestamp_mode,
            "entries": index.bboxes.len(),
        }),
    )?;
    Ok(index)
}

/// Load the persisted index, or build it when the files are missing.
pub fn load_or_build_index(ctx: &PipelineContext) -> Result<LabelIndex> {
    match load_index(&ctx.working_dir, &ctx.dataset_name) {
        Ok(index) => Ok(index),
        Err(_) => run_labels(ctx),
    }
}

/// Query all sources for all index entries and download matched scenes.
/// Ctrl-C cancels cooperatively: nothing new is scheduled, in-flight
/// requests finish.
pub async fn run_download(ctx: &PipelineContext, index: &LabelIndex) -> Result<RunOutput> {
    let download_config = ctx.config.download_config(&ctx.working_dir);
    let orchestrator = Orchestrator::with_default_connectors(download_config)?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        }
    });
    let output = orchestrator.run(index, &cancel).await;
    watcher.abort();
    let output = output?;

    let summary = output.manifest.summary();
    ctx.record_step(
        "download",
        serde_json::json!({
            "sources": ctx.config.sources.len(),
            "matched": summary.matched,
            "unmatched": summary.unmatched,
            "failed": summary.failed,
        }),
    )?;
    Ok(output)
}

/// Rasterize scenes already on disk in the working directory.
pub fn run_rasterize(ctx: &PipelineContext, index: &LabelIndex) -> Result<usize> {
    let pairings = pair_scenes_on_disk(ctx, index)?;
    rasterize_pairings(ctx, index, &pairings)
}

/// Rasterize the scenes produced by a download step in the same process.
pub fn rasterize_downloads(
    ctx: &PipelineContext,
    index: &LabelIndex,
    downloads: &[DownloadedScene],
) -> Result<usize> {
    let mut pairings = Vec::with_capacity(downloads.len());
    for download in downloads {
        let scene = geotiff_lite::read_file(&download.path)?;
        pairings.push(ScenePairing {
            scene_path: download.path.clone(),
            label_date: download.key.date,
            footprint: footprint_wgs84(&scene)?,
        });
    }
    rasterize_pairings(ctx, index, &pairings)
}

fn rasterize_pairings(
    ctx: &PipelineContext,
    index: &LabelIndex,
    pairings: &[ScenePairing],
) -> Result<usize> {
    let options = RasterizeOptions {
        set_no_data: ctx.config.set_no_data,
    };
    let results = rasterize_batch(pairings, &index.labels, &options);
    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!(
        scenes = pairings.len(),
        succeeded,
        "rasterization finished"
    );
    ctx.record_step(
        "rasterize",
        serde_json::json!({
            "set_no_data": ctx.config.set_no_data,
            "scenes": pairings.len(),
            "succeeded": succeeded,
        }),
    )?;
    Ok(succeeded)
}

/// Full pipeline: index, download, rasterize. Intermediate geometry files
/// are removed afterwards unless `keep_files` is set.
pub async fn run_all(ctx: &PipelineContext) -> Result<usize> {
    let index = run_labels(ctx)?;
    let output = run_download(ctx, &index).await?;
    if output.downloads.is_empty() {
        bail!("no scenes were matched for any index entry");
    }
    let succeeded = rasterize_downloads(ctx, &index, &output.downloads)?;

    if !ctx.config.keep_files {
        for path in [
            label_indexer::bbox_index_path(&ctx.working_dir, &ctx.dataset_name),
            label_indexer::labels_index_path(&ctx.working_dir, &ctx.dataset_name),
        ] {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(file = %path.display(), error = %e, "could not remove index file");
            }
        }
    }
    Ok(succeeded)
}

/// Pair each scene raster in the working directory with a label date: the
/// closest indexed date inside the configured allowance whose bbox the scene
/// covers. Label rasters and unrelated files are skipped.
fn pair_scenes_on_disk(ctx: &PipelineContext, index: &LabelIndex) -> Result<Vec<ScenePairing>> {
    let mut pairings = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(&ctx.working_dir)
        .with_context(|| format!("reading working dir {}", ctx.working_dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if path.extension().and_then(|e| e.to_str()) != Some("tif")
            || stem.ends_with("_labels")
        {
            continue;
        }
        let Some(scene_date) = trailing_date(stem) else {
            warn!(file = %path.display(), "no date suffix, skipping");
            continue;
        };
        let scene = match geotiff_lite::read_file(&path) {
            Ok(scene) => scene,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "unreadable raster, skipping");
                continue;
            }
        };
        let footprint = footprint_wgs84(&scene)?;
        let Some(label_date) = closest_label_date(ctx, index, scene_date, &footprint) else {
            warn!(file = %path.display(), "no index entry matches, skipping");
            continue;
        };
        pairings.push(ScenePairing {
            scene_path: path,
            label_date,
            footprint,
        });
    }
    Ok(pairings)
}

fn closest_label_date(
    ctx: &PipelineContext,
    index: &LabelIndex,
    scene_date: NaiveDate,
    footprint: &BoundingBox,
) -> Option<NaiveDate> {
    let allowance = &ctx.config.date_allowance;
    index
        .bboxes
        .iter()
        .filter(|entry| footprint.contains(&entry.bbox))
        .filter(|entry| {
            let offset = (scene_date - entry.datetime).num_days();
            offset >= -allowance.pre_days && offset <= allowance.post_days
        })
        .min_by_key(|entry| ((scene_date - entry.datetime).num_days().abs(), entry.datetime))
        .map(|entry| entry.datetime)
}

/// Dates in scene filenames sit at the end of the stem: `..._YYYY-MM-DD`.
fn trailing_date(stem: &str) -> Option<NaiveDate> {
    let token = stem.rsplit('_').next()?;
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// The scene's extent as a WGS84 bbox, from its transform and CRS.
fn footprint_wgs84(scene: &GeoTiffImage) -> Result<BoundingBox> {
    let t = &scene.transform;
    let (x1, y1) = (
        t.origin_x + scene.width as f64 * t.pixel_width,
        t.origin_y - scene.height as f64 * t.pixel_height,
    );
    let (lon0, lat0) = scene.crs.unproject(t.origin_x, t.origin_y)?;
    let (lon1, lat1) = scene.crs.unproject(x1, y1)?;
    Ok(BoundingBox::new(
        lon0.min(lon1),
        lat0.min(lat1),
        lon0.max(lon1),
        lat0.max(lat1),
    ))
}
