//! Pixel burning for vector geometry.
//!
//! Geometry arrives in the scene's CRS; every shape is converted to pixel
//! space up front so the fill itself is pure integer raster work. A pixel
//! belongs to a polygon when its center is inside (even-odd rule), which
//! keeps holes correct without tracking ring winding.

use curation_common::GridTransform;
use label_indexer::Geometry;

/// Burn `class` into every pixel covered by `geometry`. Pixels already
/// holding another class are overwritten; callers control overlap semantics
/// through burn order.
pub fn burn_geometry(
    values: &mut [i32],
    width: usize,
    height: usize,
    transform: &GridTransform,
    geometry: &Geometry,
    class: i32,
) {
    match geometry {
        Geometry::Point { coordinates } => {
            let (col, row) = transform.world_to_pixel(coordinates[0], coordinates[1]);
            burn_pixel(values, width, height, col.floor(), row.floor(), class);
        }
        Geometry::LineString { coordinates } => {
            let pixels: Vec<(f64, f64)> = coordinates
                .iter()
                .map(|p| transform.world_to_pixel(p[0], p[1]))
                .collect();
            for pair in pixels.windows(2) {
                burn_segment(values, width, height, pair[0], pair[1], class);
            }
        }
        Geometry::Polygon { coordinates } => {
            let rings = to_pixel_rings(coordinates, transform);
            fill_rings(values, width, height, &rings, class);
        }
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                let rings = to_pixel_rings(polygon, transform);
                fill_rings(values, width, height, &rings, class);
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for g in geometries {
                burn_geometry(values, width, height, transform, g, class);
            }
        }
    }
}

fn to_pixel_rings(rings: &[Vec<[f64; 2]>], transform: &GridTransform) -> Vec<Vec<(f64, f64)>> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|p| transform.world_to_pixel(p[0], p[1]))
                .collect()
        })
        .collect()
}

fn burn_pixel(values: &mut [i32], width: usize, height: usize, col: f64, row: f64, class: i32) {
    if col < 0.0 || row < 0.0 {
        return;
    }
    let (col, row) = (col as usize, row as usize);
    if col < width && row < height {
        values[row * width + col] = class;
    }
}

/// Walk a segment in pixel space, stamping every cell it passes through.
fn burn_segment(
    values: &mut [i32],
    width: usize,
    height: usize,
    from: (f64, f64),
    to: (f64, f64),
    class: i32,
) {
    let (dc, dr) = (to.0 - from.0, to.1 - from.1);
    let steps = dc.abs().max(dr.abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        burn_pixel(
            values,
            width,
            height,
            (from.0 + t * dc).floor(),
            (from.1 + t * dr).floor(),
            class,
        );
    }
}

/// Even-odd scanline fill over all rings of one polygon. Exterior and hole
/// rings go through the same crossing count, so holes stay unfilled.
fn fill_rings(
    values: &mut [i32],
    width: usize,
    height: usize,
    rings: &[Vec<(f64, f64)>],
    class: i32,
) {
    for row in 0..height {
        let y = row as f64 + 0.5;
        let mut crossings: Vec<f64> = Vec::new();
        for ring in rings {
            if ring.len() < 2 {
                continue;
            }
            for i in 0..ring.len() {
                let p = ring[i];
                let q = ring[(i + 1) % ring.len()];
                if (p.1 > y) != (q.1 > y) {
                    crossings.push(p.0 + (y - p.1) * (q.0 - p.0) / (q.1 - p.1));
                }
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for span in crossings.chunks_exact(2) {
            // Fill pixels whose center x lies inside [span0, span1).
            let start = (span[0] - 0.5).ceil().max(0.0) as usize;
            let end = ((span[1] - 0.5).ceil() as isize).min(width as isize);
            for col in start..end.max(0) as usize {
                values[row * width + col] = class;
            }
        }
    }
}
