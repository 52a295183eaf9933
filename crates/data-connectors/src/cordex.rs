//! CORDEX regional climate domains.
//!
//! The Climate Data Store serves CORDEX products per fixed regional domain;
//! a query bbox has to be mapped onto one of them. Extents below are the
//! approximate geographic envelopes of the official rotated-pole domains.

use curation_common::BoundingBox;

pub struct CordexDomain {
    pub code: &'static str,
    pub name: &'static str,
    pub bbox: BoundingBox,
    pub resolution_degrees: f64,
}

pub static CORDEX_DOMAINS: &[CordexDomain] = &[
    CordexDomain {
        code: "EUR-11",
        name: "Europe",
        bbox: BoundingBox { min_lon: -44.14, min_lat: 22.20, max_lon: 65.93, max_lat: 72.42 },
        resolution_degrees: 0.11,
    },
    CordexDomain {
        code: "EUR-44",
        name: "Europe",
        bbox: BoundingBox { min_lon: -44.14, min_lat: 22.20, max_lon: 65.93, max_lat: 72.42 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "AFR-44",
        name: "Africa",
        bbox: BoundingBox { min_lon: -24.64, min_lat: -45.76, max_lon: 60.28, max_lat: 42.24 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "NAM-44",
        name: "North America",
        bbox: BoundingBox { min_lon: -171.00, min_lat: 12.55, max_lon: -22.85, max_lat: 76.25 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "SAM-44",
        name: "South America",
        bbox: BoundingBox { min_lon: -106.25, min_lat: -57.61, max_lon: -16.65, max_lat: 18.50 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "EAS-44",
        name: "East Asia",
        bbox: BoundingBox { min_lon: 51.59, min_lat: -15.23, max_lon: 179.99, max_lat: 61.47 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "WAS-44",
        name: "South Asia",
        bbox: BoundingBox { min_lon: 19.88, min_lat: -15.91, max_lon: 115.55, max_lat: 45.07 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "AUS-44",
        name: "Australasia",
        bbox: BoundingBox { min_lon: 88.48, min_lat: -52.36, max_lon: 179.99, max_lat: 12.21 },
        resolution_degrees: 0.44,
    },
    CordexDomain {
        code: "CAM-44",
        name: "Central America",
        bbox: BoundingBox { min_lon: -124.80, min_lat: -19.46, max_lon: -25.30, max_lat: 34.83 },
        resolution_degrees: 0.44,
    },
];

/// All domain codes whose extent intersects the query bbox.
pub fn matching_domains(bbox: &BoundingBox) -> Vec<&'static CordexDomain> {
    CORDEX_DOMAINS
        .iter()
        .filter(|d| d.bbox.intersects(bbox))
        .collect()
}

/// The domain used for a query: the smallest-area intersecting domain, so a
/// European bbox gets EUR rather than a continent-spanning envelope.
pub fn best_domain(bbox: &BoundingBox) -> Option<&'static CordexDomain> {
    matching_domains(bbox)
        .into_iter()
        .min_by(|a, b| {
            a.bbox
                .area()
                .partial_cmp(&b.bbox.area())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.code.cmp(b.code))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_european_bbox_selects_eur_domain() {
        let bbox = BoundingBox::new(5.0, 45.0, 15.0, 55.0);
        let domain = best_domain(&bbox).unwrap();
        // EUR-11 and EUR-44 share an extent; code order breaks the tie
        assert_eq!(domain.code, "EUR-11");
    }

    #[test]
    fn test_african_bbox_selects_afr() {
        let bbox = BoundingBox::new(20.0, -10.0, 30.0, 0.0);
        assert_eq!(best_domain(&bbox).unwrap().code, "AFR-44");
    }

    #[test]
    fn test_pacific_bbox_matches_nothing() {
        let bbox = BoundingBox::new(-150.0, -40.0, -140.0, -30.0);
        assert!(best_domain(&bbox).is_none());
    }

    #[test]
    fn test_matching_domains_returns_all_overlaps() {
        // Southern Europe overlaps both EUR and AFR envelopes
        let bbox = BoundingBox::new(10.0, 35.0, 15.0, 40.0);
        let codes: Vec<&str> = matching_domains(&bbox).iter().map(|d| d.code).collect();
        assert!(codes.contains(&"EUR-11"));
        assert!(codes.contains(&"AFR-44"));
    }
}
