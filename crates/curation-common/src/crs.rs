//! Coordinate Reference System types and transforms.
//!
//! Scene imagery arrives in a handful of well-known CRS (WGS84 geographic,
//! Web Mercator, and the UTM zones Sentinel-2 tiles use). Transforms are
//! implemented directly so the pipeline carries no native projection library.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::BoundingBox;
use crate::error::CurationError;

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Supported coordinate reference systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// WGS84 Geographic (lon/lat in degrees) — the working CRS of the pipeline.
    Epsg4326,
    /// Web Mercator (meters).
    Epsg3857,
    /// WGS84 UTM zone (meters). `north` selects the hemisphere.
    Utm { zone: u8, north: bool },
}

impl Crs {
    /// Resolve a numeric EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, CurationError> {
        match code {
            4326 => Ok(Crs::Epsg4326),
            3857 | 900_913 => Ok(Crs::Epsg3857),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(CurationError::InvalidCrs(format!("EPSG:{}", code))),
        }
    }

    /// Parse an "EPSG:nnnn" string (case-insensitive; bare numbers accepted).
    pub fn from_epsg_string(s: &str) -> Result<Self, CurationError> {
        let digits = match s.to_uppercase().strip_prefix("EPSG:") {
            Some(rest) => rest.to_string(),
            None => s.to_string(),
        };
        let code: u32 = digits
            .trim()
            .parse()
            .map_err(|_| CurationError::InvalidCrs(s.to_string()))?;
        Self::from_epsg(code)
    }

    /// Numeric EPSG code for this CRS.
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Epsg4326 => 4326,
            Crs::Epsg3857 => 3857,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }

    /// Check if this is a geographic (lon/lat degrees) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Epsg4326)
    }

    /// Project a WGS84 lon/lat point into this CRS.
    pub fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), CurationError> {
        match self {
            Crs::Epsg4326 => Ok((lon, lat)),
            Crs::Epsg3857 => web_mercator_forward(lon, lat),
            Crs::Utm { zone, north } => Ok(utm_forward(lon, lat, *zone, *north)),
        }
    }

    /// Unproject a point in this CRS back to WGS84 lon/lat.
    pub fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64), CurationError> {
        match self {
            Crs::Epsg4326 => Ok((x, y)),
            Crs::Epsg3857 => Ok(web_mercator_inverse(x, y)),
            Crs::Utm { zone, north } => Ok(utm_inverse(x, y, *zone, *north)),
        }
    }

    /// Reproject a WGS84 bbox into this CRS by transforming its corners.
    pub fn project_bbox(&self, bbox: &BoundingBox) -> Result<BoundingBox, CurationError> {
        let (x0, y0) = self.project(bbox.min_lon, bbox.min_lat)?;
        let (x1, y1) = self.project(bbox.max_lon, bbox.max_lat)?;
        Ok(BoundingBox::new(
            x0.min(x1),
            y0.min(y1),
            x0.max(x1),
            y0.max(y1),
        ))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

fn web_mercator_forward(lon: f64, lat: f64) -> Result<(f64, f64), CurationError> {
    if lat.abs() >= 85.06 {
        return Err(CurationError::Projection(format!(
            "latitude {} outside Web Mercator range",
            lat
        )));
    }
    let x = WGS84_A * lon.to_radians();
    let y = WGS84_A * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
    Ok((x, y))
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Ellipsoidal Transverse Mercator forward projection (UTM parameters).
///
/// Standard series expansion; accuracy is millimeter-level within a zone,
/// which is far below the pixel sizes handled here.
fn utm_forward(lon: f64, lat: f64, zone: u8, north: bool) -> (f64, f64) {
    let k0 = 0.9996;
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let lon0 = (zone as f64 * 6.0 - 183.0).to_radians();
    let phi = lat.to_radians();
    let lam = lon.to_radians();

    let n = WGS84_A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * phi.cos().powi(2);
    let a_ = (lam - lon0) * phi.cos();

    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2.powi(2) / 32.0 + 45.0 * e2.powi(3) / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2.powi(2) / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2.powi(3) / 3072.0) * (6.0 * phi).sin());

    let x = k0
        * n
        * (a_
            + (1.0 - t + c) * a_.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * a_.powi(5) / 120.0)
        + 500_000.0;

    let mut y = k0
        * (m + n
            * phi.tan()
            * (a_.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * a_.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * a_.powi(6) / 720.0));

    if !north {
        y += 10_000_000.0;
    }
    (x, y)
}

/// Ellipsoidal Transverse Mercator inverse projection (UTM parameters).
fn utm_inverse(x: f64, y: f64, zone: u8, north: bool) -> (f64, f64) {
    let k0 = 0.9996;
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let lon0 = (zone as f64 * 6.0 - 183.0).to_radians();

    let x = x - 500_000.0;
    let y = if north { y } else { y - 10_000_000.0 };

    let m = y / k0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let c1 = ep2 * phi1.cos().powi(2);
    let t1 = phi1.tan().powi(2);
    let n1 = WGS84_A / (1.0 - e2 * phi1.sin().powi(2)).sqrt();
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * phi1.sin().powi(2)).powf(1.5);
    let d = x / (n1 * k0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lam = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / phi1.cos();

    (lam.to_degrees(), phi.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_epsg() {
        assert_eq!(Crs::from_epsg(4326).unwrap(), Crs::Epsg4326);
        assert_eq!(Crs::from_epsg(3857).unwrap(), Crs::Epsg3857);
        assert_eq!(
            Crs::from_epsg(32633).unwrap(),
            Crs::Utm {
                zone: 33,
                north: true
            }
        );
        assert_eq!(
            Crs::from_epsg(32719).unwrap(),
            Crs::Utm {
                zone: 19,
                north: false
            }
        );
        assert!(Crs::from_epsg(99999).is_err());
    }

    #[test]
    fn test_from_epsg_string() {
        assert_eq!(Crs::from_epsg_string("EPSG:4326").unwrap(), Crs::Epsg4326);
        assert_eq!(Crs::from_epsg_string("epsg:3857").unwrap(), Crs::Epsg3857);
        assert_eq!(Crs::from_epsg_string("32633").unwrap().epsg(), 32633);
        assert!(Crs::from_epsg_string("not-a-crs").is_err());
    }

    #[test]
    fn test_web_mercator_roundtrip() {
        let (x, y) = Crs::Epsg3857.project(-122.4, 37.8).unwrap();
        let (lon, lat) = Crs::Epsg3857.unproject(x, y).unwrap();
        assert!((lon - -122.4).abs() < 1e-9);
        assert!((lat - 37.8).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_rejects_polar_latitudes() {
        assert!(Crs::Epsg3857.project(0.0, 89.0).is_err());
    }

    #[test]
    fn test_utm_roundtrip() {
        // Zone 33N covers 12E..18E
        let crs = Crs::Utm {
            zone: 33,
            north: true,
        };
        let (x, y) = crs.project(15.0, 52.0).unwrap();
        // Central meridian maps to the 500km false easting
        assert!((x - 500_000.0).abs() < 1.0);
        let (lon, lat) = crs.unproject(x, y).unwrap();
        assert!((lon - 15.0).abs() < 1e-7);
        assert!((lat - 52.0).abs() < 1e-7);
    }

    #[test]
    fn test_utm_south_roundtrip() {
        let crs = Crs::Utm {
            zone: 19,
            north: false,
        };
        let (x, y) = crs.project(-70.0, -33.5).unwrap();
        assert!(y > 0.0); // false northing keeps southern coordinates positive
        let (lon, lat) = crs.unproject(x, y).unwrap();
        assert!((lon - -70.0).abs() < 1e-7);
        assert!((lat - -33.5).abs() < 1e-7);
    }
}
