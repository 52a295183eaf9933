//! In-memory raster grids for scene data and rasterized labels.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::crs::Crs;
use crate::error::CurationError;

/// North-up affine geotransform. Pixel (0,0) is the top-left corner of the
/// grid; `pixel_height` is the positive magnitude of the (negative) row step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GridTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GridTransform {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Derive a transform covering `bbox` with the given pixel dimensions.
    pub fn from_bbox(bbox: &BoundingBox, width: usize, height: usize) -> Result<Self, CurationError> {
        if width == 0 || height == 0 {
            return Err(CurationError::InvalidGrid(format!(
                "grid dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        Ok(GridTransform {
            origin_x: bbox.min_lon,
            origin_y: bbox.max_lat,
            pixel_width: bbox.width() / width as f64,
            pixel_height: bbox.height() / height as f64,
        })
    }

    /// Map world coordinates to fractional pixel coordinates (col, row).
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (self.origin_y - y) / self.pixel_height;
        (col, row)
    }

    /// World coordinates of a pixel's center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y - (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }
}

/// Multi-band raster with band-major f32 storage.
///
/// Band `b`, row `r`, column `c` lives at `data[b * width * height + r * width + c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub bands: usize,
    pub width: usize,
    pub height: usize,
    pub crs: Crs,
    pub transform: GridTransform,
    pub data: Vec<f32>,
}

impl RasterGrid {
    pub fn new(
        bands: usize,
        width: usize,
        height: usize,
        crs: Crs,
        transform: GridTransform,
        data: Vec<f32>,
    ) -> Result<Self, CurationError> {
        if bands == 0 || width == 0 || height == 0 {
            return Err(CurationError::InvalidGrid(format!(
                "raster dimensions must be non-zero, got {} bands {}x{}",
                bands, width, height
            )));
        }
        let expected = bands * width * height;
        if data.len() != expected {
            return Err(CurationError::InvalidGrid(format!(
                "data length {} does not match {} bands of {}x{}",
                data.len(),
                bands,
                width,
                height
            )));
        }
        Ok(RasterGrid {
            bands,
            width,
            height,
            crs,
            transform,
            data,
        })
    }

    /// Allocate a grid filled with a constant value.
    pub fn filled(
        bands: usize,
        width: usize,
        height: usize,
        crs: Crs,
        transform: GridTransform,
        value: f32,
    ) -> Result<Self, CurationError> {
        let data = vec![value; bands * width * height];
        Self::new(bands, width, height, crs, transform, data)
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.data[band * self.width * self.height + row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: f32) {
        self.data[band * self.width * self.height + row * self.width + col] = value;
    }

    /// One band's samples, row-major.
    pub fn band(&self, band: usize) -> &[f32] {
        let plane = self.width * self.height;
        &self.data[band * plane..(band + 1) * plane]
    }

    /// Spatial footprint of the grid in its own CRS.
    pub fn footprint(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y - self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> GridTransform {
        // 10x10 degree box at 1 degree/pixel, origin at (0, 10)
        GridTransform::new(0.0, 10.0, 1.0, 1.0)
    }

    #[test]
    fn test_world_to_pixel() {
        let t = transform();
        let (col, row) = t.world_to_pixel(0.0, 10.0);
        assert_eq!((col, row), (0.0, 0.0));
        let (col, row) = t.world_to_pixel(5.5, 4.5);
        assert_eq!((col, row), (5.5, 5.5));
    }

    #[test]
    fn test_pixel_center_roundtrip() {
        let t = transform();
        let (x, y) = t.pixel_center(3, 7);
        let (col, row) = t.world_to_pixel(x, y);
        assert_eq!(col.floor() as usize, 3);
        assert_eq!(row.floor() as usize, 7);
    }

    #[test]
    fn test_from_bbox() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let t = GridTransform::from_bbox(&bbox, 20, 10).unwrap();
        assert_eq!(t.origin_x, 0.0);
        assert_eq!(t.origin_y, 10.0);
        assert_eq!(t.pixel_width, 0.5);
        assert_eq!(t.pixel_height, 1.0);
        assert!(GridTransform::from_bbox(&bbox, 0, 10).is_err());
    }

    #[test]
    fn test_grid_indexing_band_major() {
        let mut grid =
            RasterGrid::filled(2, 4, 3, Crs::Epsg4326, transform(), 0.0).unwrap();
        grid.set(1, 2, 3, 9.0);
        assert_eq!(grid.get(1, 2, 3), 9.0);
        assert_eq!(grid.data[1 * 12 + 2 * 4 + 3], 9.0);
        assert_eq!(grid.band(0).len(), 12);
        assert!(grid.band(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        let result = RasterGrid::new(1, 4, 3, Crs::Epsg4326, transform(), vec![0.0; 11]);
        assert!(result.is_err());
    }

    #[test]
    fn test_footprint() {
        let grid = RasterGrid::filled(1, 10, 10, Crs::Epsg4326, transform(), 0.0).unwrap();
        let fp = grid.footprint();
        assert_eq!(fp, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    }
}
