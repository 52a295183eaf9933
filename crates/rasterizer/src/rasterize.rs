//! Scene/label pairing and label raster production.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use curation_common::{BoundingBox, Crs, GridTransform};
use geotiff_lite::{GeoTiffImage, SampleBuffer};
use label_indexer::{Geometry, LabelsIndexEntry};

use crate::burn::burn_geometry;
use crate::error::{RasterizerError, RasterizerResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterizeOptions {
    /// When true, background cells carry -1 and class 0 is a legal label
    /// value. When false (default), background is 0 and class 0 is rejected.
    pub set_no_data: bool,
}

impl RasterizeOptions {
    pub fn background(&self) -> i32 {
        if self.set_no_data {
            -1
        } else {
            0
        }
    }
}

/// A class raster cell-aligned to one scene grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedLabel {
    pub width: usize,
    pub height: usize,
    pub crs: Crs,
    pub transform: GridTransform,
    pub no_data: Option<i32>,
    pub values: Vec<i32>,
}

/// Labels keyed to a scene: same group date, bbox covered by the scene
/// footprint. Order of the input slice is preserved so burn order stays
/// stable.
pub fn labels_for_scene<'a>(
    labels: &'a [LabelsIndexEntry],
    date: NaiveDate,
    footprint: &BoundingBox,
) -> Vec<&'a LabelsIndexEntry> {
    labels
        .iter()
        .filter(|entry| entry.key.date == date)
        .filter(|entry| match entry.geometry.bounds() {
            Some(bounds) => footprint.contains(&bounds),
            None => false,
        })
        .collect()
}

/// Class 0 only coexists with a background of 0 by corrupting it. Checked
/// before any pixel is written.
pub fn check_class_ids(
    labels: &[&LabelsIndexEntry],
    options: &RasterizeOptions,
) -> RasterizerResult<()> {
    if !options.set_no_data && labels.iter().any(|entry| entry.class_id == 0) {
        return Err(RasterizerError::ClassNoDataCollision);
    }
    Ok(())
}

/// Burn the matched labels onto the scene's grid.
///
/// Geometries are stored in EPSG:4326 and reprojected into the scene CRS
/// before burning; raster-mask labels are resampled nearest-neighbor. Labels
/// burn in slice order, later entries overwriting earlier ones.
#[instrument(skip_all, fields(labels = labels.len(), crs = %scene.crs))]
pub fn rasterize_scene(
    scene: &GeoTiffImage,
    labels: &[&LabelsIndexEntry],
    options: &RasterizeOptions,
) -> RasterizerResult<RasterizedLabel> {
    check_class_ids(labels, options)?;

    let background = options.background();
    let mut values = vec![background; scene.width * scene.height];

    for entry in labels {
        if let Some(mask_path) = &entry.mask_path {
            resample_mask(
                &mut values,
                scene.width,
                scene.height,
                scene.crs,
                &scene.transform,
                mask_path,
                background,
            )?;
            continue;
        }
        let geometry = entry.geometry.reproject(Crs::Epsg4326, scene.crs)?;
        check_area(&geometry, entry.datetime, scene.crs)?;
        burn_geometry(
            &mut values,
            scene.width,
            scene.height,
            &scene.transform,
            &geometry,
            entry.class_id as i32,
        );
    }

    Ok(RasterizedLabel {
        width: scene.width,
        height: scene.height,
        crs: scene.crs,
        transform: scene.transform,
        no_data: options.set_no_data.then_some(-1),
        values,
    })
}

/// Rasterize the labels for one scene file on disk, writing the result next
/// to it as `{stem}_labels.tif`. Returns the output path.
pub fn rasterize_file(
    scene_path: &Path,
    labels: &[&LabelsIndexEntry],
    options: &RasterizeOptions,
) -> RasterizerResult<PathBuf> {
    if labels.is_empty() {
        return Err(RasterizerError::NoMatchingLabels(scene_path.to_path_buf()));
    }
    let scene = geotiff_lite::read_file(scene_path)?;
    let rasterized = rasterize_scene(&scene, labels, options)?;

    let output = label_output_path(scene_path);
    let image = GeoTiffImage::new(
        rasterized.width,
        rasterized.height,
        1,
        rasterized.crs,
        rasterized.transform,
        rasterized.no_data.map(f64::from),
        SampleBuffer::I32(rasterized.values),
    )?;
    let tmp = output.with_extension("tif.partial");
    geotiff_lite::write_file(&tmp, &image)?;
    std::fs::rename(&tmp, &output)?;
    debug!(file = %output.display(), "label raster written");
    Ok(output)
}

/// `scene.tif` -> `scene_labels.tif`, alongside the imagery.
pub fn label_output_path(scene_path: &Path) -> PathBuf {
    let stem = scene_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    scene_path.with_file_name(format!("{}_labels.tif", stem))
}

/// One (scene file, label date) pair for batch rasterization.
#[derive(Debug, Clone)]
pub struct ScenePairing {
    pub scene_path: PathBuf,
    pub label_date: NaiveDate,
    pub footprint: BoundingBox,
}

/// Rasterize many scenes in parallel. Failures stay per-scene; a scene that
/// cannot be rasterized is logged and skipped, the rest complete.
#[instrument(skip_all, fields(scenes = pairings.len()))]
pub fn rasterize_batch(
    pairings: &[ScenePairing],
    labels: &[LabelsIndexEntry],
    options: &RasterizeOptions,
) -> Vec<(PathBuf, RasterizerResult<PathBuf>)> {
    pairings
        .par_iter()
        .map(|pairing| {
            let matched = labels_for_scene(labels, pairing.label_date, &pairing.footprint);
            let result = rasterize_file(&pairing.scene_path, &matched, options);
            if let Err(e) = &result {
                warn!(
                    scene = %pairing.scene_path.display(),
                    error = %e,
                    "rasterization failed"
                );
            }
            (pairing.scene_path.clone(), result)
        })
        .collect()
}

fn check_area(geometry: &Geometry, date: NaiveDate, crs: Crs) -> RasterizerResult<()> {
    if let Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } = geometry {
        let degenerate = match geometry.bounds() {
            Some(bounds) => bounds.width() <= 0.0 || bounds.height() <= 0.0,
            None => true,
        };
        if degenerate {
            return Err(RasterizerError::ZeroAreaGeometry {
                date,
                crs: crs.to_string(),
            });
        }
    }
    Ok(())
}

/// Nearest-neighbor transfer of a pre-rasterized label mask onto the scene
/// grid. Cells holding the mask's own no-data (or background) are skipped so
/// earlier burns survive underneath.
fn resample_mask(
    values: &mut [i32],
    width: usize,
    height: usize,
    crs: Crs,
    transform: &GridTransform,
    mask_path: &Path,
    background: i32,
) -> RasterizerResult<()> {
    let mask = geotiff_lite::read_file(mask_path).map_err(|source| RasterizerError::Mask {
        path: mask_path.to_path_buf(),
        source,
    })?;
    let mask_values: Vec<i32> = match &mask.samples {
        SampleBuffer::I32(v) => v.clone(),
        SampleBuffer::F32(v) => v.iter().map(|&x| x as i32).collect(),
    };
    let skip = mask.no_data.map(|nd| nd as i32).unwrap_or(background);

    for row in 0..height {
        for col in 0..width {
            let (x, y) = transform.pixel_center(col, row);
            let (lon, lat) = crs.unproject(x, y)?;
            let (mx, my) = mask.crs.project(lon, lat)?;
            let (mcol, mrow) = mask.transform.world_to_pixel(mx, my);
            if mcol < 0.0 || mrow < 0.0 {
                continue;
            }
            let (mcol, mrow) = (mcol as usize, mrow as usize);
            if mcol >= mask.width || mrow >= mask.height {
                continue;
            }
            let value = mask_values[mrow * mask.width + mcol];
            if value != skip {
                values[row * width + col] = value;
            }
        }
    }
    Ok(())
}
