//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::CurationError;

/// A geographic bounding box in `(min_lon, min_lat, max_lon, max_lat)` order.
///
/// Coordinates are degrees for geographic CRS (EPSG:4326) and meters for
/// projected CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Validate a geographic bbox: ordered corners within WGS84 bounds.
    pub fn validated(self) -> Result<Self, CurationError> {
        if !(self.min_lon < self.max_lon && self.min_lat < self.max_lat) {
            return Err(CurationError::InvalidBbox(format!(
                "corners out of order: ({}, {}, {}, {})",
                self.min_lon, self.min_lat, self.max_lon, self.max_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.min_lon)
            || !(-180.0..=180.0).contains(&self.max_lon)
            || !(-90.0..=90.0).contains(&self.min_lat)
            || !(-90.0..=90.0).contains(&self.max_lat)
        {
            return Err(CurationError::InvalidBbox(format!(
                "coordinates outside WGS84 range: ({}, {}, {}, {})",
                self.min_lon, self.min_lat, self.max_lon, self.max_lat
            )));
        }
        Ok(self)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Area in squared coordinate units.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
            && self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
    }

    /// Check if `other` lies entirely within this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
            && other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Smallest bbox covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Grow the bbox by `padding` coordinate units on every side.
    pub fn padded(&self, padding: f64) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon - padding,
            min_lat: self.min_lat - padding,
            max_lon: self.max_lon + padding,
            max_lat: self.max_lat + padding,
        }
    }

    /// Corner coordinates as a closed exterior ring (counter-clockwise).
    pub fn to_ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ]
    }

    /// Flat `[min_lon, min_lat, max_lon, max_lat]` array for query strings.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_rejects_unordered_corners() {
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 1.0).validated().is_err());
        assert!(BoundingBox::new(0.0, 5.0, 1.0, 2.0).validated().is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).validated().is_ok());
    }

    #[test]
    fn test_validated_rejects_out_of_range() {
        assert!(BoundingBox::new(-200.0, 0.0, 1.0, 1.0).validated().is_err());
        assert!(BoundingBox::new(0.0, -95.0, 1.0, 1.0).validated().is_err());
    }

    #[test]
    fn test_intersects_and_contains() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(2.0, 2.0, 4.0, 4.0);

        assert!(a.intersects(&b));
        assert!(!a.contains(&b));
        assert!(a.contains(&c));
        assert!(a.contains_point(3.0, 3.0));
        assert!(!a.contains_point(11.0, 3.0));
    }

    #[test]
    fn test_union() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(2.0, -1.0, 3.0, 0.5);
        let u = a.union(&b);
        assert_eq!(u, BoundingBox::new(0.0, -1.0, 3.0, 1.0));
    }
}
