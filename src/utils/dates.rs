//! Normalization of provider date strings to `YYYY-MM-DD`.
//!
//! Portals report dates in their own formats, for example
//! `24 October 2025 12:34:56 PM`, `24-OCT-2025 12:34 PM`, or an ISO-8601
//! timestamp. Formatting is best effort: anything unrecognized is handed back
//! untouched so a date can never be the reason a fetch fails.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid ISO date pattern"));

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[\s\-/.]+([A-Za-z]+)\.?[\s\-/.,]+(\d{4})\b")
        .expect("valid day-month-year pattern")
});

const MONTHS: [(&str, &str, u32); 12] = [
    ("january", "jan", 1),
    ("february", "feb", 2),
    ("march", "mar", 3),
    ("april", "apr", 4),
    ("may", "may", 5),
    ("june", "jun", 6),
    ("july", "jul", 7),
    ("august", "aug", 8),
    ("september", "sep", 9),
    ("october", "oct", 10),
    ("november", "nov", 11),
    ("december", "dec", 12),
];

/// Look up a month by full English name or three-letter abbreviation,
/// ignoring case. `Sept` is accepted as well.
///
/// # Examples
///
/// ```
/// use utility_usage::utils::dates::month_number;
///
/// assert_eq!(month_number("October"), Some(10));
/// assert_eq!(month_number("OCT"), Some(10));
/// assert_eq!(month_number("Sept"), Some(9));
/// assert_eq!(month_number("Octember"), None);
/// ```
pub fn month_number(name: &str) -> Option<u32> {
    let lowered = name.trim().to_ascii_lowercase();
    if lowered == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .find(|(full, short, _)| lowered == *full || lowered == *short)
        .map(|(_, _, number)| *number)
}

/// Parse a provider date string into a calendar date.
///
/// Returns `None` for anything that is not one of the known shapes or that
/// names an impossible day.
pub fn parse_provider_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_PREFIX.captures(trimmed) {
        let year = caps[1].parse::<i32>().ok()?;
        let month = caps[2].parse::<u32>().ok()?;
        let day = caps[3].parse::<u32>().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let caps = DAY_MONTH_YEAR.captures(trimmed)?;
    let day = caps[1].parse::<u32>().ok()?;
    let month = month_number(&caps[2])?;
    let year = caps[3].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Normalize a provider date to `YYYY-MM-DD`, or return it unchanged.
///
/// # Examples
///
/// ```
/// use utility_usage::utils::dates::normalize_date;
///
/// assert_eq!(normalize_date("24 October 2025 12:34:56 PM"), "2025-10-24");
/// assert_eq!(normalize_date("24-OCT-2025 12:34 PM"), "2025-10-24");
/// assert_eq!(normalize_date("2025-10-24T08:15:00.000+06:00"), "2025-10-24");
/// assert_eq!(normalize_date("yesterday"), "yesterday");
/// ```
pub fn normalize_date(raw: &str) -> String {
    match parse_provider_date(raw) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_month_name() {
        assert_eq!(normalize_date("1 January 2024 09:00:00 AM"), "2024-01-01");
    }

    #[test]
    fn test_abbreviated_month_uppercase() {
        assert_eq!(normalize_date("05-FEB-2025 11:20 AM"), "2025-02-05");
    }

    #[test]
    fn test_iso_date_only() {
        assert_eq!(normalize_date("2025-03-09"), "2025-03-09");
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored_when_parsed() {
        assert_eq!(normalize_date("  24 October 2025  "), "2025-10-24");
    }

    #[test]
    fn test_impossible_day_passes_through() {
        assert_eq!(normalize_date("31 February 2025"), "31 February 2025");
        assert_eq!(normalize_date("2025-13-40"), "2025-13-40");
    }

    #[test]
    fn test_unknown_month_passes_through() {
        assert_eq!(normalize_date("24 Octember 2025"), "24 Octember 2025");
    }

    #[test]
    fn test_empty_passes_through() {
        assert_eq!(normalize_date(""), "");
        assert_eq!(normalize_date("   "), "   ");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_date("24-OCT-2025 12:34 PM");
        assert_eq!(normalize_date(&once), once);
    }
}
