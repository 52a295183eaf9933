//! Filename-embedded metadata extraction.
//!
//! Two-tier date convention: an ISO `YYYY-MM-DD` token wins over compact
//! standalone digit runs (`YYYYMMDD`, `YYYYDDD` day-of-year, `YYMMDD`).
//! Tokens must not be part of a longer digit run, dates must fall in
//! `1950-01-01..=today`, and the first valid occurrence wins. Class ids
//! are read from a `_CLASS_<int>_` token, defaulting to 1.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::{IndexerError, IndexerResult};

// Digit runs are delimited manually below; the regex crate has no lookaround.
fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap())
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_CLASS_(\d+)_").unwrap())
}

const MIN_DATE: (i32, u32, u32) = (1950, 1, 1);

/// Extract the label date from a filename.
pub fn extract_date(filename: &str) -> IndexerResult<NaiveDate> {
    let stem = std::path::Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let mut candidates: Vec<NaiveDate> = Vec::new();
    for m in iso_date_re().find_iter(&stem) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            if in_bounds(date) {
                candidates.push(date);
            }
        }
    }
    if candidates.is_empty() {
        for token in digit_runs(&stem) {
            if let Some(date) = parse_compact_token(token) {
                candidates.push(date);
            }
        }
    }

    match candidates.as_slice() {
        [] => Err(IndexerError::TimestampParse(stem)),
        [date] => Ok(*date),
        [first, ..] => {
            warn!(
                filename = %stem,
                count = candidates.len(),
                "multiple date tokens found, using first occurrence"
            );
            Ok(*first)
        }
    }
}

/// Extract the class id from a `_CLASS_<int>_` token; default 1.
pub fn extract_class(filename: &str) -> u32 {
    class_re()
        .captures(filename)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1)
}

/// Standalone 6/7/8-digit runs (not part of a longer digit run).
fn digit_runs(stem: &str) -> impl Iterator<Item = &str> {
    let bytes = stem.as_bytes();
    let mut runs = Vec::new();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(&stem[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(&stem[s..]);
    }
    runs.into_iter().filter(|r| (6..=8).contains(&r.len()))
}

fn parse_compact_token(token: &str) -> Option<NaiveDate> {
    let date = match token.len() {
        // YYYYDDD: year + day of year
        7 => NaiveDate::parse_from_str(token, "%Y%j").ok()?,
        8 => NaiveDate::parse_from_str(token, "%Y%m%d").ok()?,
        // YYMMDD: chrono's %y pivot (00-68 -> 2000s) matches the convention
        6 => NaiveDate::parse_from_str(token, "%y%m%d").ok()?,
        _ => return None,
    };
    in_bounds(date).then_some(date)
}

fn in_bounds(date: NaiveDate) -> bool {
    let min = NaiveDate::from_ymd_opt(MIN_DATE.0, MIN_DATE.1, MIN_DATE.2)
        .unwrap_or(NaiveDate::MIN);
    date >= min && date <= Utc::now().date_naive() && date.year() >= MIN_DATE.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_iso_token() {
        assert_eq!(
            extract_date("flood_2024-08-26_CLASS_2_.geojson").unwrap(),
            d(2024, 8, 26)
        );
        assert_eq!(extract_date("label-1999-12-31.json").unwrap(), d(1999, 12, 31));
    }

    #[test]
    fn test_compact_yyyymmdd() {
        assert_eq!(extract_date("scene_20240826.tif").unwrap(), d(2024, 8, 26));
    }

    #[test]
    fn test_compact_day_of_year() {
        // 2024 day 239 = 2024-08-26
        assert_eq!(extract_date("fire_2024239_mask.tif").unwrap(), d(2024, 8, 26));
    }

    #[test]
    fn test_compact_yymmdd_pivots_to_2000s() {
        assert_eq!(extract_date("aoi_240826.geojson").unwrap(), d(2024, 8, 26));
    }

    #[test]
    fn test_longer_digit_runs_are_not_dates() {
        // 9-digit run must not yield a date from any 8-digit window
        assert!(extract_date("tile_202408261.geojson").is_err());
    }

    #[test]
    fn test_rejects_out_of_bounds_dates() {
        assert!(extract_date("ancient_19200101.tif").is_err());
        assert!(extract_date("future_2150-01-01.tif").is_err());
    }

    #[test]
    fn test_first_valid_token_wins() {
        assert_eq!(
            extract_date("a_20240101_b_20240615.geojson").unwrap(),
            d(2024, 1, 1)
        );
        // Invalid first token falls through to the next
        assert_eq!(extract_date("a_999999_20240615.tif").unwrap(), d(2024, 6, 15));
    }

    #[test]
    fn test_iso_preferred_over_compact() {
        assert_eq!(
            extract_date("s2_20230101_export_2024-08-26.geojson").unwrap(),
            d(2024, 8, 26)
        );
    }

    #[test]
    fn test_no_date_errors() {
        assert!(matches!(
            extract_date("labels.geojson"),
            Err(IndexerError::TimestampParse(_))
        ));
    }

    #[test]
    fn test_class_token() {
        assert_eq!(extract_class("flood_2024-08-26_CLASS_3_.geojson"), 3);
        assert_eq!(extract_class("x_CLASS_0_y.tif"), 0);
        assert_eq!(extract_class("no_class_token_here.geojson"), 1);
    }
}
