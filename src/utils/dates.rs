//! Date header parsing and year inference.
//!
//! Listing headers read like "Monday, March 3" and carry no year. The year is
//! chosen relative to an explicit reference date: of the candidate dates in
//! the previous, current and next year, those whose weekday agrees with the
//! header win, and among them the one closest to the reference date is kept
//! (the later one on a tie).

use std::sync::OnceLock;

use chrono::{Datelike, Month, NaiveDate, Weekday};
use regex::Regex;

use crate::models::SHOW_DATE_FORMAT;

/// Parsed "weekday, month day" header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateHeader {
    pub weekday: Weekday,
    pub month: u32,
    pub day: u32,
}

fn header_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^([A-Za-z]+)\.?,\s*([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?$").ok()
        })
        .as_ref()
}

/// Parse a header like "Monday, March 3". Returns `None` when the text does
/// not follow the pattern or names an unknown weekday/month.
pub fn parse_date_header(text: &str) -> Option<DateHeader> {
    let text = crate::utils::normalize_whitespace(text);
    let caps = header_pattern()?.captures(&text)?;

    let weekday: Weekday = caps[1].parse().ok()?;
    let month: Month = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    if !(1..=31).contains(&day) {
        return None;
    }

    Some(DateHeader {
        weekday,
        month: month.number_from_month(),
        day,
    })
}

/// Pick the calendar date a header refers to, relative to `reference`.
pub fn resolve_year(header: DateHeader, reference: NaiveDate) -> Option<NaiveDate> {
    let candidates: Vec<NaiveDate> = [reference.year() - 1, reference.year(), reference.year() + 1]
        .into_iter()
        .filter_map(|year| NaiveDate::from_ymd_opt(year, header.month, header.day))
        .collect();

    let matching: Vec<NaiveDate> = candidates
        .iter()
        .copied()
        .filter(|date| date.weekday() == header.weekday)
        .collect();
    let pool = if matching.is_empty() {
        candidates
    } else {
        matching
    };

    pool.into_iter()
        .min_by_key(|date| ((*date - reference).num_days().abs(), std::cmp::Reverse(*date)))
}

/// Render a date the way staging rows carry it.
pub fn format_show_date(date: NaiveDate) -> String {
    date.format(SHOW_DATE_FORMAT).to_string()
}

/// Parse a staging `show_date` back into a date.
pub fn parse_show_date(text: &str) -> Option<NaiveDate> {
    let text = crate::utils::normalize_whitespace(text);
    NaiveDate::parse_from_str(&text, "%A, %B %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_header() {
        let header = parse_date_header("Monday, March 3").unwrap();
        assert_eq!(header.weekday, Weekday::Mon);
        assert_eq!(header.month, 3);
        assert_eq!(header.day, 3);

        assert!(parse_date_header("  Tuesday,\n  December 30 ").is_some());
        assert!(parse_date_header("Sat., Jan. 4th").is_some());
    }

    #[test]
    fn test_parse_date_header_rejects_garbage() {
        assert!(parse_date_header("Fooday, Marchtember 99").is_none());
        assert!(parse_date_header("Monday, March 32").is_none());
        assert!(parse_date_header("March 3").is_none());
        assert!(parse_date_header("").is_none());
    }

    #[test]
    fn test_resolve_year_same_year() {
        // 2025-03-03 is a Monday.
        let header = parse_date_header("Monday, March 3").unwrap();
        assert_eq!(resolve_year(header, ymd(2025, 3, 1)), Some(ymd(2025, 3, 3)));
    }

    #[test]
    fn test_resolve_year_december_listing_read_in_january() {
        // 2024-12-30 is a Monday.
        let header = parse_date_header("Monday, December 30").unwrap();
        assert_eq!(resolve_year(header, ymd(2025, 1, 2)), Some(ymd(2024, 12, 30)));
    }

    #[test]
    fn test_resolve_year_january_listing_read_in_december() {
        // 2026-01-02 is a Friday.
        let header = parse_date_header("Friday, January 2").unwrap();
        assert_eq!(resolve_year(header, ymd(2025, 12, 28)), Some(ymd(2026, 1, 2)));
    }

    #[test]
    fn test_resolve_year_weekday_mismatch_falls_back_to_nearest() {
        // March 3 falls on Sun/Mon/Tue in 2024-2026; Wednesday matches none.
        let header = DateHeader {
            weekday: Weekday::Wed,
            month: 3,
            day: 3,
        };
        assert_eq!(resolve_year(header, ymd(2025, 2, 20)), Some(ymd(2025, 3, 3)));
    }

    #[test]
    fn test_resolve_year_leap_day() {
        // 2024-02-29 is a Thursday; only leap years are candidates.
        let header = parse_date_header("Thursday, February 29").unwrap();
        assert_eq!(resolve_year(header, ymd(2025, 1, 10)), Some(ymd(2024, 2, 29)));
        let header = parse_date_header("Friday, February 30").unwrap();
        assert_eq!(resolve_year(header, ymd(2025, 1, 10)), None);
    }

    #[test]
    fn test_show_date_text_round_trip() {
        let date = ymd(2025, 3, 3);
        let text = format_show_date(date);
        assert_eq!(text, "Monday, March 3 2025");
        assert_eq!(parse_show_date(&text), Some(date));
        assert_eq!(parse_show_date("Fooday, Marchtember 99"), None);
    }
}
