//! Scene-level rasterization behavior, including the background encoding
//! policy and on-disk output.

use chrono::NaiveDate;

use curation_common::{BoundingBox, Crs, GridTransform};
use geotiff_lite::{GeoTiffImage, SampleBuffer};
use label_indexer::{Geometry, GroupKey, LabelsIndexEntry};
use rasterizer::{
    label_output_path, labels_for_scene, rasterize_file, rasterize_scene, RasterizeOptions,
    RasterizerError,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn scene_8x8() -> GeoTiffImage {
    let bbox = BoundingBox::new(0.0, 0.0, 8.0, 8.0);
    let transform = GridTransform::from_bbox(&bbox, 8, 8).unwrap();
    GeoTiffImage::new(
        8,
        8,
        1,
        Crs::Epsg4326,
        transform,
        None,
        SampleBuffer::F32(vec![0.0; 64]),
    )
    .unwrap()
}

fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Geometry {
    Geometry::from_bbox(&BoundingBox::new(min_lon, min_lat, max_lon, max_lat))
}

fn label(class_id: u32, geometry: Geometry, d: NaiveDate) -> LabelsIndexEntry {
    LabelsIndexEntry {
        key: GroupKey {
            dataset: "floods".to_string(),
            date: d,
        },
        datetime: d,
        class_id,
        geometry,
        mask_path: None,
    }
}

#[test]
fn class_zero_with_default_background_is_rejected() {
    let scene = scene_8x8();
    let d = date(2024, 8, 26);
    let entries = vec![label(0, square(1.0, 1.0, 3.0, 3.0), d)];
    let refs: Vec<&LabelsIndexEntry> = entries.iter().collect();

    let err = rasterize_scene(&scene, &refs, &RasterizeOptions::default()).unwrap_err();
    assert!(matches!(err, RasterizerError::ClassNoDataCollision));
}

#[test]
fn class_zero_allowed_when_no_data_enabled() {
    let scene = scene_8x8();
    let d = date(2024, 8, 26);
    let entries = vec![label(0, square(1.0, 1.0, 3.0, 3.0), d)];
    let refs: Vec<&LabelsIndexEntry> = entries.iter().collect();

    let options = RasterizeOptions { set_no_data: true };
    let out = rasterize_scene(&scene, &refs, &options).unwrap();
    assert_eq!(out.no_data, Some(-1));
    // Background is -1, burned cells are 0.
    assert!(out.values.contains(&0));
    assert!(out.values.contains(&-1));
    assert!(out.values.iter().all(|&v| v == 0 || v == -1));
}

#[test]
fn overlapping_labels_resolve_last_write_wins() {
    let scene = scene_8x8();
    let d = date(2024, 8, 26);
    // Class 1 covers A+B, class 2 covers B+C; B must end up class 2.
    let entries = vec![
        label(1, square(0.0, 4.0, 4.0, 8.0), d),
        label(2, square(2.0, 4.0, 6.0, 8.0), d),
    ];
    let refs: Vec<&LabelsIndexEntry> = entries.iter().collect();

    let out = rasterize_scene(&scene, &refs, &RasterizeOptions::default()).unwrap();
    let at = |col: usize, row: usize| out.values[row * 8 + col];
    // A (cols 0..2), B (cols 2..4), C (cols 4..6), all rows 0..4.
    assert_eq!(at(1, 1), 1);
    assert_eq!(at(3, 1), 2);
    assert_eq!(at(5, 1), 2);
    assert_eq!(at(7, 7), 0);
}

#[test]
fn labels_match_by_date_and_containment() {
    let d = date(2024, 8, 26);
    let other = date(2024, 9, 2);
    let entries = vec![
        label(1, square(1.0, 1.0, 3.0, 3.0), d),
        label(1, square(1.0, 1.0, 3.0, 3.0), other),
        label(1, square(20.0, 20.0, 25.0, 25.0), d),
    ];
    let footprint = BoundingBox::new(0.0, 0.0, 8.0, 8.0);

    let matched = labels_for_scene(&entries, d, &footprint);
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].datetime, d);
}

#[test]
fn zero_area_polygon_is_fatal() {
    let scene = scene_8x8();
    let d = date(2024, 8, 26);
    let entries = vec![label(
        1,
        Geometry::Polygon {
            coordinates: vec![vec![[2.0, 2.0], [2.0, 5.0], [2.0, 2.0]]],
        },
        d,
    )];
    let refs: Vec<&LabelsIndexEntry> = entries.iter().collect();

    let err = rasterize_scene(&scene, &refs, &RasterizeOptions::default()).unwrap_err();
    assert!(matches!(err, RasterizerError::ZeroAreaGeometry { .. }));
}

#[test]
fn rasterize_file_writes_grid_identical_raster() {
    let dir = tempfile::tempdir().unwrap();
    let scene_path = dir.path().join("sentinel_aws_sentinel-2-l2a_2024-08-27.tif");
    let scene = scene_8x8();
    geotiff_lite::write_file(&scene_path, &scene).unwrap();

    let d = date(2024, 8, 26);
    let entries = vec![label(3, square(2.0, 2.0, 6.0, 6.0), d)];
    let refs: Vec<&LabelsIndexEntry> = entries.iter().collect();

    let output = rasterize_file(&scene_path, &refs, &RasterizeOptions::default()).unwrap();
    assert_eq!(
        output.file_name().unwrap().to_str().unwrap(),
        "sentinel_aws_sentinel-2-l2a_2024-08-27_labels.tif"
    );

    let written = geotiff_lite::read_file(&output).unwrap();
    assert_eq!(written.width, scene.width);
    assert_eq!(written.height, scene.height);
    assert_eq!(written.crs, scene.crs);
    assert_eq!(written.transform, scene.transform);
    assert_eq!(written.bands, 1);
    match &written.samples {
        SampleBuffer::I32(values) => {
            assert_eq!(values.iter().filter(|&&v| v == 3).count(), 16);
        }
        SampleBuffer::F32(_) => panic!("expected integer samples"),
    }
}

#[test]
fn missing_labels_is_an_error_per_scene() {
    let dir = tempfile::tempdir().unwrap();
    let scene_path = dir.path().join("scene.tif");
    geotiff_lite::write_file(&scene_path, &scene_8x8()).unwrap();

    let err = rasterize_file(&scene_path, &[], &RasterizeOptions::default()).unwrap_err();
    assert!(matches!(err, RasterizerError::NoMatchingLabels(_)));
}

#[test]
fn label_path_derivation() {
    let p = label_output_path(std::path::Path::new("/data/run/optical_2024-08-27.tif"));
    assert_eq!(
        p,
        std::path::PathBuf::from("/data/run/optical_2024-08-27_labels.tif")
    );
}
