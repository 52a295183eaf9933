//! Directory scan, grouping, and index persistence.

use chrono::NaiveDate;
use curation_common::{BoundingBox, Crs};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{IndexerError, IndexerResult};
use crate::filename::{extract_class, extract_date};
use crate::geojson::{Feature, FeatureCollection, Geometry};
use crate::metadata::{MetadataTable, METADATA_FILENAME};

/// Where a label file's timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampMode {
    Filename,
    Csv,
}

impl Default for TimestampMode {
    fn default() -> Self {
        TimestampMode::Filename
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub dataset_name: String,
    pub labels_dir: PathBuf,
    pub timestamp_mode: TimestampMode,
    /// Abort on the first per-file error instead of skip-and-warn.
    pub strict: bool,
}

/// Gridded class mask loaded from a raster label file.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMask {
    pub width: usize,
    pub height: usize,
    pub crs: Crs,
    pub transform: curation_common::GridTransform,
    pub values: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelGeometry {
    Vector(Vec<Geometry>),
    Raster(LabelMask),
}

/// One indexed label file.
#[derive(Debug, Clone)]
pub struct LabelRecord {
    pub path: PathBuf,
    pub bounding_box: BoundingBox,
    pub timestamp: NaiveDate,
    pub class_id: u32,
    pub geometry: LabelGeometry,
}

/// Grouping key for index entries. Records sharing dataset and date land in
/// one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub dataset: String,
    pub date: NaiveDate,
}

/// One query unit for the download stage: the bounding union of all label
/// geometry for a (dataset, date) group.
#[derive(Debug, Clone, PartialEq)]
pub struct BboxIndexEntry {
    pub key: GroupKey,
    pub datetime: NaiveDate,
    pub bbox: BoundingBox,
}

/// One label row for the rasterization stage. Raster labels keep their
/// source path so the mask can be reloaded lazily.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelsIndexEntry {
    pub key: GroupKey,
    pub datetime: NaiveDate,
    pub class_id: u32,
    pub geometry: Geometry,
    pub mask_path: Option<PathBuf>,
}

/// The bbox/labels index pair. Every labels entry has a bbox entry with the
/// same key; bbox entries are sorted by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelIndex {
    pub bboxes: Vec<BboxIndexEntry>,
    pub labels: Vec<LabelsIndexEntry>,
}

impl LabelIndex {
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    /// Labels belonging to one bbox entry, in stable scan order.
    pub fn labels_for(&self, key: &GroupKey) -> Vec<&LabelsIndexEntry> {
        self.labels.iter().filter(|l| &l.key == key).collect()
    }
}

/// Scan the labels folder and build the index pair.
#[instrument(skip(config), fields(dataset = %config.dataset_name, dir = %config.labels_dir.display()))]
pub fn index_labels(config: &IndexerConfig) -> IndexerResult<LabelIndex> {
    if !config.labels_dir.is_dir() {
        return Err(IndexerError::EmptyLabelsFolder(config.labels_dir.clone()));
    }

    let metadata = match config.timestamp_mode {
        TimestampMode::Csv => Some(MetadataTable::load(&config.labels_dir)?),
        TimestampMode::Filename => None,
    };

    // Sorted walk keeps record order (and thus burn order) reproducible.
    let mut records: Vec<LabelRecord> = Vec::new();
    for entry in WalkDir::new(&config.labels_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == METADATA_FILENAME || name.starts_with('.') {
            continue;
        }

        match index_one(path, &name, metadata.as_ref()) {
            Ok(record) => records.push(record),
            Err(e) if config.strict => return Err(e),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unindexable label file");
            }
        }
    }

    if records.is_empty() {
        return Err(IndexerError::EmptyLabelsFolder(config.labels_dir.clone()));
    }

    Ok(group_records(&config.dataset_name, records))
}

fn index_one(
    path: &Path,
    name: &str,
    metadata: Option<&MetadataTable>,
) -> IndexerResult<LabelRecord> {
    let timestamp = match metadata {
        Some(table) => table.date_for(name)?,
        None => extract_date(name)?,
    };
    let class_id = extract_class(name);

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let (bounding_box, geometry) = match extension.as_str() {
        "geojson" | "json" => load_vector(path)?,
        "tif" | "tiff" => load_raster(path)?,
        _ => return Err(IndexerError::UnsupportedLabelType(path.to_path_buf())),
    };

    Ok(LabelRecord {
        path: path.to_path_buf(),
        bounding_box,
        timestamp,
        class_id,
        geometry,
    })
}

fn load_vector(path: &Path) -> IndexerResult<(BoundingBox, LabelGeometry)> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| IndexerError::InvalidGeoJson {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    // Label files may be a FeatureCollection, a single Feature, or a bare
    // geometry.
    let geometries: Vec<Geometry> = match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let fc: FeatureCollection =
                serde_json::from_value(value).map_err(|e| IndexerError::InvalidGeoJson {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            fc.features.into_iter().map(|f| f.geometry).collect()
        }
        Some("Feature") => {
            let f: Feature =
                serde_json::from_value(value).map_err(|e| IndexerError::InvalidGeoJson {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            vec![f.geometry]
        }
        Some(_) => {
            let g: Geometry =
                serde_json::from_value(value).map_err(|e| IndexerError::InvalidGeoJson {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            vec![g]
        }
        None => {
            return Err(IndexerError::InvalidGeoJson {
                path: path.to_path_buf(),
                reason: "missing 'type' member".to_string(),
            })
        }
    };

    let bbox = geometries
        .iter()
        .filter_map(Geometry::bounds)
        .reduce(|a, b| a.union(&b))
        .ok_or_else(|| IndexerError::InvalidGeoJson {
            path: path.to_path_buf(),
            reason: "no coordinates".to_string(),
        })?;

    Ok((bbox, LabelGeometry::Vector(geometries)))
}

fn load_raster(path: &Path) -> IndexerResult<(BoundingBox, LabelGeometry)> {
    let image = geotiff_lite::read_file(path).map_err(|source| IndexerError::InvalidRaster {
        path: path.to_path_buf(),
        source,
    })?;

    let values: Vec<i32> = match &image.samples {
        geotiff_lite::SampleBuffer::I32(v) => v.clone(),
        geotiff_lite::SampleBuffer::F32(v) => v.iter().map(|s| *s as i32).collect(),
    };
    let mask = LabelMask {
        width: image.width,
        height: image.height,
        crs: image.crs,
        transform: image.transform,
        values,
    };

    // Index bboxes live in the working CRS.
    let fp = mask_footprint(&mask);
    let bbox = if image.crs.is_geographic() {
        fp
    } else {
        let (lon0, lat0) = image.crs.unproject(fp.min_lon, fp.min_lat)?;
        let (lon1, lat1) = image.crs.unproject(fp.max_lon, fp.max_lat)?;
        BoundingBox::new(
            lon0.min(lon1),
            lat0.min(lat1),
            lon0.max(lon1),
            lat0.max(lat1),
        )
    };

    Ok((bbox, LabelGeometry::Raster(mask)))
}

fn mask_footprint(mask: &LabelMask) -> BoundingBox {
    let t = &mask.transform;
    BoundingBox::new(
        t.origin_x,
        t.origin_y - mask.height as f64 * t.pixel_height,
        t.origin_x + mask.width as f64 * t.pixel_width,
        t.origin_y,
    )
}

fn group_records(dataset: &str, records: Vec<LabelRecord>) -> LabelIndex {
    let mut groups: BTreeMap<GroupKey, BoundingBox> = BTreeMap::new();
    let mut labels: Vec<LabelsIndexEntry> = Vec::new();

    for record in records {
        let key = GroupKey {
            dataset: dataset.to_string(),
            date: record.timestamp,
        };
        groups
            .entry(key.clone())
            .and_modify(|b| *b = b.union(&record.bounding_box))
            .or_insert(record.bounding_box);

        match record.geometry {
            LabelGeometry::Vector(geometries) => {
                for geometry in geometries {
                    labels.push(LabelsIndexEntry {
                        key: key.clone(),
                        datetime: record.timestamp,
                        class_id: record.class_id,
                        geometry,
                        mask_path: None,
                    });
                }
            }
            LabelGeometry::Raster(_) => {
                labels.push(LabelsIndexEntry {
                    key: key.clone(),
                    datetime: record.timestamp,
                    class_id: record.class_id,
                    geometry: Geometry::from_bbox(&record.bounding_box),
                    mask_path: Some(record.path.clone()),
                });
            }
        }
    }

    let bboxes = groups
        .into_iter()
        .map(|(key, bbox)| BboxIndexEntry {
            datetime: key.date,
            key,
            bbox,
        })
        .collect::<Vec<_>>();

    info!(
        groups = bboxes.len(),
        label_rows = labels.len(),
        "label index built"
    );
    LabelIndex { bboxes, labels }
}

pub fn bbox_index_path(working_dir: &Path, dataset: &str) -> PathBuf {
    working_dir.join(format!("{}_all_bboxes.geojson", dataset))
}

pub fn labels_index_path(working_dir: &Path, dataset: &str) -> PathBuf {
    working_dir.join(format!("{}_labels.geojson", dataset))
}

/// Persist both index files under the working dir. These files are the
/// resume checkpoint for the download stage.
pub fn persist_index(index: &LabelIndex, working_dir: &Path, dataset: &str) -> IndexerResult<()> {
    std::fs::create_dir_all(working_dir)?;

    let bbox_features = index
        .bboxes
        .iter()
        .map(|entry| {
            Feature::new(Geometry::from_bbox(&entry.bbox))
                .with_property("dataset", json!(entry.key.dataset))
                .with_property("datetime", json!(entry.datetime.format("%Y-%m-%d").to_string()))
        })
        .collect();
    write_collection(
        &bbox_index_path(working_dir, dataset),
        &FeatureCollection::new(bbox_features),
    )?;

    let label_features = index
        .labels
        .iter()
        .map(|entry| {
            let mut f = Feature::new(entry.geometry.clone())
                .with_property("dataset", json!(entry.key.dataset))
                .with_property("datetime", json!(entry.datetime.format("%Y-%m-%d").to_string()))
                .with_property("class_id", json!(entry.class_id));
            if let Some(mask_path) = &entry.mask_path {
                f = f.with_property("mask_path", json!(mask_path.to_string_lossy()));
            }
            f
        })
        .collect();
    write_collection(
        &labels_index_path(working_dir, dataset),
        &FeatureCollection::new(label_features),
    )?;

    Ok(())
}

fn write_collection(path: &Path, fc: &FeatureCollection) -> IndexerResult<()> {
    let body = serde_json::to_string_pretty(fc).map_err(|e| IndexerError::InvalidGeoJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, body)?;
    Ok(())
}

/// Load a previously persisted index pair.
pub fn load_index(working_dir: &Path, dataset: &str) -> IndexerResult<LabelIndex> {
    let bbox_path = bbox_index_path(working_dir, dataset);
    let labels_path = labels_index_path(working_dir, dataset);

    let bbox_fc = read_collection(&bbox_path)?;
    let labels_fc = read_collection(&labels_path)?;

    let mut bboxes = Vec::with_capacity(bbox_fc.features.len());
    for feature in &bbox_fc.features {
        let datetime = read_datetime(feature, &bbox_path)?;
        let bbox = feature
            .geometry
            .bounds()
            .ok_or_else(|| IndexerError::InvalidGeoJson {
                path: bbox_path.clone(),
                reason: "bbox feature without coordinates".to_string(),
            })?;
        bboxes.push(BboxIndexEntry {
            key: GroupKey {
                dataset: feature
                    .property_str("dataset")
                    .unwrap_or(dataset)
                    .to_string(),
                date: datetime,
            },
            datetime,
            bbox,
        });
    }

    let mut labels = Vec::with_capacity(labels_fc.features.len());
    for feature in labels_fc.features {
        let datetime = read_datetime(&feature, &labels_path)?;
        labels.push(LabelsIndexEntry {
            key: GroupKey {
                dataset: feature
                    .property_str("dataset")
                    .unwrap_or(dataset)
                    .to_string(),
                date: datetime,
            },
            datetime,
            class_id: feature.property_u64("class_id").unwrap_or(1) as u32,
            mask_path: feature.property_str("mask_path").map(PathBuf::from),
            geometry: feature.geometry,
        });
    }

    Ok(LabelIndex { bboxes, labels })
}

fn read_collection(path: &Path) -> IndexerResult<FeatureCollection> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| IndexerError::InvalidGeoJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_datetime(feature: &Feature, path: &Path) -> IndexerResult<NaiveDate> {
    let raw = feature
        .property_str("datetime")
        .ok_or_else(|| IndexerError::InvalidGeoJson {
            path: path.to_path_buf(),
            reason: "feature missing 'datetime' property".to_string(),
        })?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| IndexerError::InvalidGeoJson {
        path: path.to_path_buf(),
        reason: format!("unparsable 'datetime' property {:?}", raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_label(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    fn polygon_json(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
        serde_json::to_string(&Geometry::from_bbox(&BoundingBox::new(x0, y0, x1, y1))).unwrap()
    }

    fn config(dir: &Path, strict: bool) -> IndexerConfig {
        IndexerConfig {
            dataset_name: "floods".to_string(),
            labels_dir: dir.to_path_buf(),
            timestamp_mode: TimestampMode::Filename,
            strict,
        }
    }

    #[test]
    fn test_index_groups_by_date_and_unions_bboxes() {
        let dir = tempfile::tempdir().unwrap();
        write_label(
            dir.path(),
            "a_2024-08-26.geojson",
            &polygon_json(0.0, 0.0, 1.0, 1.0),
        );
        write_label(
            dir.path(),
            "b_2024-08-26_CLASS_2_.geojson",
            &polygon_json(2.0, 0.5, 3.0, 2.0),
        );
        write_label(
            dir.path(),
            "c_2025-04-23.geojson",
            &polygon_json(10.0, 10.0, 11.0, 11.0),
        );

        let index = index_labels(&config(dir.path(), true)).unwrap();
        assert_eq!(index.bboxes.len(), 2);
        assert_eq!(index.labels.len(), 3);

        let first = &index.bboxes[0];
        assert_eq!(
            first.datetime,
            NaiveDate::from_ymd_opt(2024, 8, 26).unwrap()
        );
        assert_eq!(first.bbox, BoundingBox::new(0.0, 0.0, 3.0, 2.0));

        let group_labels = index.labels_for(&first.key);
        assert_eq!(group_labels.len(), 2);
        assert_eq!(group_labels[0].class_id, 1);
        assert_eq!(group_labels[1].class_id, 2);
    }

    #[test]
    fn test_strict_mode_fails_on_undated_file() {
        let dir = tempfile::tempdir().unwrap();
        write_label(dir.path(), "no_date.geojson", &polygon_json(0.0, 0.0, 1.0, 1.0));
        assert!(matches!(
            index_labels(&config(dir.path(), true)),
            Err(IndexerError::TimestampParse(_))
        ));
    }

    #[test]
    fn test_lenient_mode_skips_undated_file() {
        let dir = tempfile::tempdir().unwrap();
        write_label(dir.path(), "no_date.geojson", &polygon_json(0.0, 0.0, 1.0, 1.0));
        write_label(
            dir.path(),
            "ok_2024-08-26.geojson",
            &polygon_json(0.0, 0.0, 1.0, 1.0),
        );
        let index = index_labels(&config(dir.path(), false)).unwrap();
        assert_eq!(index.bboxes.len(), 1);
    }

    #[test]
    fn test_empty_folder_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            index_labels(&config(dir.path(), false)),
            Err(IndexerError::EmptyLabelsFolder(_))
        ));
    }

    #[test]
    fn test_csv_mode_uses_metadata_dates() {
        let dir = tempfile::tempdir().unwrap();
        write_label(
            dir.path(),
            "metadata.csv",
            "filename,date\nfield.geojson,2024-08-26\n",
        );
        write_label(dir.path(), "field.geojson", &polygon_json(0.0, 0.0, 1.0, 1.0));

        let mut cfg = config(dir.path(), true);
        cfg.timestamp_mode = TimestampMode::Csv;
        let index = index_labels(&cfg).unwrap();
        assert_eq!(
            index.bboxes[0].datetime,
            NaiveDate::from_ymd_opt(2024, 8, 26).unwrap()
        );
    }

    #[test]
    fn test_persist_and_load_roundtrip() {
        let labels_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        write_label(
            labels_dir.path(),
            "a_2024-08-26_CLASS_2_.geojson",
            &polygon_json(0.25, -1.5, 1.75, 2.5),
        );

        let index = index_labels(&config(labels_dir.path(), true)).unwrap();
        persist_index(&index, work_dir.path(), "floods").unwrap();
        let loaded = load_index(work_dir.path(), "floods").unwrap();

        assert_eq!(loaded.bboxes.len(), index.bboxes.len());
        assert_eq!(loaded.bboxes[0].datetime, index.bboxes[0].datetime);
        assert_eq!(loaded.bboxes[0].bbox, index.bboxes[0].bbox);
        assert_eq!(loaded.labels[0].class_id, 2);
        assert_eq!(loaded.labels[0].geometry, index.labels[0].geometry);
    }
}
