//! Optional raster transforms, applied in a fixed order:
//! scale -> impute-NaN -> reproject.
//!
//! Imputation assumes physically-scaled values and reprojection resamples,
//! so the order is part of the contract, not a free choice.

use curation_common::{BoundingBox, Crs, CurationError, GridTransform, RasterGrid};

use crate::config::TransformConfig;

/// Run the configured steps over one fetched scene grid.
pub fn apply(
    mut grid: RasterGrid,
    config: &TransformConfig,
    scale_factors: &[f64],
) -> Result<RasterGrid, CurationError> {
    if config.scale_data {
        scale(&mut grid, scale_factors);
    }
    if config.impute_nans {
        impute_nans(&mut grid);
    }
    if config.reproject {
        grid = reproject_to_wgs84(&grid)?;
    }
    Ok(grid)
}

/// Multiply each band by its collection scaling factor. Bands beyond the
/// factor list keep their stored values.
fn scale(grid: &mut RasterGrid, factors: &[f64]) {
    let plane = grid.width * grid.height;
    for (band, factor) in factors.iter().enumerate().take(grid.bands) {
        if *factor == 1.0 {
            continue;
        }
        let start = band * plane;
        for sample in &mut grid.data[start..start + plane] {
            *sample = (*sample as f64 * factor) as f32;
        }
    }
}

/// Replace NaN cells by their nearest valid neighbor, scanning each row
/// left-to-right and right-to-left, then columns for anything still unset.
/// A band with no valid samples at all is left untouched.
fn impute_nans(grid: &mut RasterGrid) {
    let (w, h) = (grid.width, grid.height);
    for band in 0..grid.bands {
        // Row pass: nearest valid value in the same row.
        for row in 0..h {
            let mut last_valid: Option<(usize, f32)> = None;
            let mut fills: Vec<(usize, f32)> = Vec::new();
            let row_vals: Vec<f32> = (0..w).map(|c| grid.get(band, row, c)).collect();
            for col in 0..w {
                let v = row_vals[col];
                if !v.is_nan() {
                    last_valid = Some((col, v));
                    continue;
                }
                let left = last_valid;
                let right = row_vals[col + 1..]
                    .iter()
                    .position(|x| !x.is_nan())
                    .map(|off| (col + 1 + off, row_vals[col + 1 + off]));
                let nearest = match (left, right) {
                    (Some((lc, lv)), Some((rc, rv))) => {
                        // Left wins exact ties for determinism.
                        if col - lc <= rc - col {
                            Some(lv)
                        } else {
                            Some(rv)
                        }
                    }
                    (Some((_, lv)), None) => Some(lv),
                    (None, Some((_, rv))) => Some(rv),
                    (None, None) => None,
                };
                if let Some(v) = nearest {
                    fills.push((col, v));
                }
            }
            for (col, v) in fills {
                grid.set(band, row, col, v);
            }
        }
        // Column pass for rows that were entirely NaN.
        for col in 0..w {
            for row in 0..h {
                if !grid.get(band, row, col).is_nan() {
                    continue;
                }
                let up = (0..row).rev().map(|r| grid.get(band, r, col)).find(|v| !v.is_nan());
                let down = (row + 1..h).map(|r| grid.get(band, r, col)).find(|v| !v.is_nan());
                if let Some(v) = up.or(down) {
                    grid.set(band, row, col, v);
                }
            }
        }
    }
}

/// Nearest-neighbor resample onto a geographic (EPSG:4326) grid with the
/// same pixel counts. Identity when the grid is already geographic.
fn reproject_to_wgs84(grid: &RasterGrid) -> Result<RasterGrid, CurationError> {
    if grid.crs.is_geographic() {
        return Ok(grid.clone());
    }

    let src_fp = grid.footprint();
    let (lon0, lat0) = grid.crs.unproject(src_fp.min_lon, src_fp.min_lat)?;
    let (lon1, lat1) = grid.crs.unproject(src_fp.max_lon, src_fp.max_lat)?;
    let target_fp = BoundingBox::new(
        lon0.min(lon1),
        lat0.min(lat1),
        lon0.max(lon1),
        lat0.max(lat1),
    );
    let transform = GridTransform::from_bbox(&target_fp, grid.width, grid.height)?;

    let mut out = RasterGrid::filled(
        grid.bands,
        grid.width,
        grid.height,
        Crs::Epsg4326,
        transform,
        f32::NAN,
    )?;

    for row in 0..grid.height {
        for col in 0..grid.width {
            let (lon, lat) = transform.pixel_center(col, row);
            let (sx, sy) = grid.crs.project(lon, lat)?;
            let (fc, fr) = grid.transform.world_to_pixel(sx, sy);
            let (sc, sr) = (fc.floor(), fr.floor());
            if sc < 0.0 || sr < 0.0 {
                continue;
            }
            let (sc, sr) = (sc as usize, sr as usize);
            if sc >= grid.width || sr >= grid.height {
                continue;
            }
            for band in 0..grid.bands {
                out.set(band, row, col, grid.get(band, sr, sc));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_1band(width: usize, height: usize, data: Vec<f32>) -> RasterGrid {
        RasterGrid::new(
            1,
            width,
            height,
            Crs::Epsg4326,
            GridTransform::new(0.0, height as f64, 1.0, 1.0),
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_scale_per_band() {
        let mut grid = RasterGrid::new(
            2,
            2,
            1,
            Crs::Epsg4326,
            GridTransform::new(0.0, 1.0, 1.0, 1.0),
            vec![100.0, 200.0, 7.0, 8.0],
        )
        .unwrap();
        scale(&mut grid, &[0.01, 1.0]);
        assert_eq!(grid.band(0), &[1.0, 2.0]);
        assert_eq!(grid.band(1), &[7.0, 8.0]);
    }

    #[test]
    fn test_impute_prefers_nearest_in_row() {
        let mut grid = grid_1band(4, 1, vec![1.0, f32::NAN, f32::NAN, 5.0]);
        impute_nans(&mut grid);
        // index 1 is closer to the left value, index 2 ties and left wins
        assert_eq!(grid.band(0), &[1.0, 1.0, 1.0, 5.0]);
    }

    #[test]
    fn test_impute_fills_fully_nan_row_from_column() {
        let mut grid = grid_1band(2, 2, vec![f32::NAN, f32::NAN, 3.0, 4.0]);
        impute_nans(&mut grid);
        assert_eq!(grid.band(0), &[3.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_impute_leaves_all_nan_band_alone() {
        let mut grid = grid_1band(2, 1, vec![f32::NAN, f32::NAN]);
        impute_nans(&mut grid);
        assert!(grid.band(0).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_reproject_identity_for_geographic() {
        let grid = grid_1band(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let out = apply(
            grid.clone(),
            &TransformConfig { scale_data: false, impute_nans: false, reproject: true },
            &[],
        )
        .unwrap();
        assert_eq!(out, grid);
    }

    #[test]
    fn test_reproject_utm_grid_lands_in_wgs84() {
        let utm = Crs::Utm { zone: 33, north: true };
        // 2x2 km around the zone's central meridian at ~52N
        let (x0, y0) = utm.project(15.0, 52.0).unwrap();
        let grid = RasterGrid::new(
            1,
            4,
            4,
            utm,
            GridTransform::new(x0 - 1000.0, y0 + 1000.0, 500.0, 500.0),
            (0..16).map(|i| i as f32).collect(),
        )
        .unwrap();

        let out = reproject_to_wgs84(&grid).unwrap();
        assert_eq!(out.crs, Crs::Epsg4326);
        assert_eq!((out.width, out.height), (4, 4));
        let fp = out.footprint();
        assert!(fp.contains_point(15.0, 52.0));
        // Center pixels must carry source values, not NaN
        assert!(!out.get(0, 2, 2).is_nan());
    }

    #[test]
    fn test_fixed_order_scale_then_impute() {
        let grid = grid_1band(2, 1, vec![f32::NAN, 100.0]);
        let out = apply(
            grid,
            &TransformConfig { scale_data: true, impute_nans: true, reproject: false },
            &[0.01],
        )
        .unwrap();
        // NaN was imputed from the already-scaled neighbor
        assert_eq!(out.band(0), &[1.0, 1.0]);
    }
}
