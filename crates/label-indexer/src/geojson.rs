//! Minimal GeoJSON model (RFC 7946 subset) used for label files and the
//! persisted index files.

use curation_common::{BoundingBox, Crs, CurationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Position lists nest per geometry type, so each variant carries its own
/// coordinate shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
}

impl Geometry {
    /// Axis-aligned bounds, or `None` for empty geometry.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let mut acc: Option<BoundingBox> = None;
        self.for_each_position(&mut |p| {
            let point = BoundingBox::new(p[0], p[1], p[0], p[1]);
            acc = Some(match acc {
                Some(b) => b.union(&point),
                None => point,
            });
        });
        acc
    }

    /// Rebuild the geometry with every position transformed between CRS.
    pub fn reproject(&self, from: Crs, to: Crs) -> Result<Geometry, CurationError> {
        if from == to {
            return Ok(self.clone());
        }
        let tx = |p: &[f64; 2]| -> Result<[f64; 2], CurationError> {
            let (lon, lat) = from.unproject(p[0], p[1])?;
            let (x, y) = to.project(lon, lat)?;
            Ok([x, y])
        };
        Ok(match self {
            Geometry::Point { coordinates } => Geometry::Point {
                coordinates: tx(coordinates)?,
            },
            Geometry::LineString { coordinates } => Geometry::LineString {
                coordinates: coordinates.iter().map(|p| tx(p)).collect::<Result<_, _>>()?,
            },
            Geometry::Polygon { coordinates } => Geometry::Polygon {
                coordinates: coordinates
                    .iter()
                    .map(|ring| ring.iter().map(|p| tx(p)).collect::<Result<_, _>>())
                    .collect::<Result<_, _>>()?,
            },
            Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
                coordinates: coordinates
                    .iter()
                    .map(|poly| {
                        poly.iter()
                            .map(|ring| ring.iter().map(|p| tx(p)).collect::<Result<_, _>>())
                            .collect::<Result<_, _>>()
                    })
                    .collect::<Result<_, _>>()?,
            },
            Geometry::GeometryCollection { geometries } => Geometry::GeometryCollection {
                geometries: geometries
                    .iter()
                    .map(|g| g.reproject(from, to))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    /// Polygon geometry covering a bbox.
    pub fn from_bbox(bbox: &BoundingBox) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![bbox.to_ring()],
        }
    }

    fn for_each_position(&self, f: &mut impl FnMut(&[f64; 2])) {
        match self {
            Geometry::Point { coordinates } => f(coordinates),
            Geometry::LineString { coordinates } => coordinates.iter().for_each(f),
            Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().for_each(f)
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().for_each(f)
            }
            Geometry::GeometryCollection { geometries } => {
                for g in geometries {
                    g.for_each_position(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Feature {
            feature_type: "Feature".to_string(),
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn property_u64(&self, key: &str) -> Option<u64> {
        self.properties.get(key).and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry {
        Geometry::from_bbox(&BoundingBox::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_bounds_of_polygon() {
        let g = square(1.0, 2.0, 5.0, 7.0);
        assert_eq!(g.bounds(), Some(BoundingBox::new(1.0, 2.0, 5.0, 7.0)));
    }

    #[test]
    fn test_bounds_of_collection() {
        let g = Geometry::GeometryCollection {
            geometries: vec![square(0.0, 0.0, 1.0, 1.0), square(3.0, -2.0, 4.0, 0.5)],
        };
        assert_eq!(g.bounds(), Some(BoundingBox::new(0.0, -2.0, 4.0, 1.0)));
    }

    #[test]
    fn test_empty_collection_has_no_bounds() {
        let g = Geometry::GeometryCollection { geometries: vec![] };
        assert_eq!(g.bounds(), None);
    }

    #[test]
    fn test_serde_roundtrip_tags_type() {
        let g = square(0.0, 0.0, 1.0, 1.0);
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["type"], "Polygon");
        let back: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn test_reproject_identity() {
        let g = square(10.0, 50.0, 11.0, 51.0);
        assert_eq!(g.reproject(Crs::Epsg4326, Crs::Epsg4326).unwrap(), g);
    }

    #[test]
    fn test_reproject_roundtrip_through_utm() {
        let g = square(14.5, 51.5, 15.5, 52.5);
        let utm = Crs::Utm {
            zone: 33,
            north: true,
        };
        let projected = g.reproject(Crs::Epsg4326, utm).unwrap();
        let back = projected.reproject(utm, Crs::Epsg4326).unwrap();
        let b = back.bounds().unwrap();
        assert!((b.min_lon - 14.5).abs() < 1e-6);
        assert!((b.max_lat - 52.5).abs() < 1e-6);
    }
}
