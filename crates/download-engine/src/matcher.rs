//! Candidate scene selection.

use chrono::NaiveDate;
use data_connectors::SceneDescriptor;

/// Pick the best candidate for a label timestamp.
///
/// Candidates above the cloud cover limit are dropped; unreported cloud
/// cover is retained (absence of data is not grounds for rejection).
/// Selection minimizes the distance between acquisition date and label
/// timestamp; ties go to the lowest reported cloud cover (unreported sorts
/// after reported), then to the lexicographically smallest scene id so the
/// choice is deterministic.
pub fn select_scene<'a>(
    candidates: &'a [SceneDescriptor],
    timestamp: NaiveDate,
    max_cloud_cover: f64,
) -> Option<&'a SceneDescriptor> {
    candidates
        .iter()
        .filter(|c| c.cloud_cover_pct.map_or(true, |cc| cc <= max_cloud_cover))
        .min_by(|a, b| rank(a, timestamp).partial_cmp(&rank(b, timestamp)).unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.provider_id.cmp(&b.provider_id)))
}

fn rank(scene: &SceneDescriptor, timestamp: NaiveDate) -> (i64, u8, f64) {
    let distance = (scene.acquisition_date() - timestamp).num_days().abs();
    match scene.cloud_cover_pct {
        Some(cc) => (distance, 0, cc),
        None => (distance, 1, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use curation_common::BoundingBox;
    use std::collections::HashMap;

    fn scene(id: &str, date: &str, cloud: Option<f64>) -> SceneDescriptor {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        SceneDescriptor {
            provider_id: id.to_string(),
            collection: "c".to_string(),
            acquisition: Utc
                .from_utc_datetime(&date.and_hms_opt(10, 0, 0).unwrap()),
            cloud_cover_pct: cloud,
            footprint: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            assets: HashMap::new(),
        }
    }

    fn ts(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_closest_date_wins() {
        let candidates = vec![
            scene("far", "2024-09-10", Some(1.0)),
            scene("near", "2024-08-27", Some(50.0)),
        ];
        let best = select_scene(&candidates, ts("2024-08-26"), 80.0).unwrap();
        assert_eq!(best.provider_id, "near");
    }

    #[test]
    fn test_cloud_filter_drops_candidates() {
        let candidates = vec![
            scene("cloudy", "2024-08-26", Some(95.0)),
            scene("clear", "2024-08-29", Some(5.0)),
        ];
        let best = select_scene(&candidates, ts("2024-08-26"), 80.0).unwrap();
        assert_eq!(best.provider_id, "clear");
    }

    #[test]
    fn test_unreported_cloud_cover_is_retained() {
        let candidates = vec![scene("no_cc", "2024-08-26", None)];
        assert!(select_scene(&candidates, ts("2024-08-26"), 10.0).is_some());
    }

    #[test]
    fn test_date_tie_breaks_on_cloud_cover() {
        let candidates = vec![
            scene("b", "2024-08-27", Some(30.0)),
            scene("a", "2024-08-27", Some(10.0)),
        ];
        let best = select_scene(&candidates, ts("2024-08-26"), 80.0).unwrap();
        assert_eq!(best.provider_id, "a");
    }

    #[test]
    fn test_reported_cloud_preferred_over_unreported_on_tie() {
        let candidates = vec![
            scene("unknown", "2024-08-27", None),
            scene("known", "2024-08-27", Some(70.0)),
        ];
        let best = select_scene(&candidates, ts("2024-08-26"), 80.0).unwrap();
        assert_eq!(best.provider_id, "known");
    }

    #[test]
    fn test_full_tie_breaks_on_scene_id() {
        let candidates = vec![
            scene("scene_b", "2024-08-27", Some(10.0)),
            scene("scene_a", "2024-08-27", Some(10.0)),
        ];
        let best = select_scene(&candidates, ts("2024-08-26"), 80.0).unwrap();
        assert_eq!(best.provider_id, "scene_a");
    }

    #[test]
    fn test_all_filtered_yields_none() {
        let candidates = vec![scene("cloudy", "2024-08-26", Some(90.0))];
        assert!(select_scene(&candidates, ts("2024-08-26"), 80.0).is_none());
    }
}
