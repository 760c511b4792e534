use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());
static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// A closed [start, end] interval of UTC timestamps covering a calendar unit.
///
/// `end` sits on the last microsecond of the unit, so containment checks are
/// inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScopeInterval {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Invalid scope value: '{0}'. Allowed values are: 'last-month', 'last-year', 'ytd', 'YYYY', 'YYYY-MM'"
)]
pub struct InvalidScope(pub String);

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Some(
        NaiveDate::from_ymd_opt(year, month, 1)?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

fn month_end(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    Some(month_start(next_year, next_month)? - Duration::microseconds(1))
}

/// Parses a scope token into the date interval it names, evaluated against `now`.
///
/// Accepted tokens: `last-month`, `last-year`, `ytd`, `YYYY`, `YYYY-MM`.
/// Pure and deterministic given `now`; callers pass `Utc::now()`.
pub fn parse_scope(token: &str, now: DateTime<Utc>) -> Result<ScopeInterval, InvalidScope> {
    let invalid = || InvalidScope(token.to_string());

    if token == "last-month" {
        // Last microsecond before the start of the current month.
        let end = month_start(now.year(), now.month()).ok_or_else(invalid)? - Duration::microseconds(1);
        let start = month_start(end.year(), end.month()).ok_or_else(invalid)?;
        return Ok(ScopeInterval { start, end });
    }

    if token == "last-year" {
        let end = month_start(now.year(), 1).ok_or_else(invalid)? - Duration::microseconds(1);
        let start = month_start(end.year(), 1).ok_or_else(invalid)?;
        return Ok(ScopeInterval { start, end });
    }

    if token == "ytd" {
        let start = month_start(now.year(), 1).ok_or_else(invalid)?;
        let end = now
            .date_naive()
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .ok_or_else(invalid)?
            .and_utc();
        return Ok(ScopeInterval { start, end });
    }

    if let Some(captures) = YEAR_RE.captures(token) {
        let year: i32 = captures[1].parse().map_err(|_| invalid())?;
        let start = month_start(year, 1).ok_or_else(invalid)?;
        let end = month_end(year, 12).ok_or_else(invalid)?;
        return Ok(ScopeInterval { start, end });
    }

    if let Some(captures) = YEAR_MONTH_RE.captures(token) {
        let year: i32 = captures[1].parse().map_err(|_| invalid())?;
        let month: u32 = captures[2].parse().map_err(|_| invalid())?;
        let start = month_start(year, month).ok_or_else(invalid)?;
        let end = month_end(year, month).ok_or_else(invalid)?;
        return Ok(ScopeInterval { start, end });
    }

    Err(invalid())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        micros: i64,
    ) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .unwrap()
            + Duration::microseconds(micros)
    }

    #[test]
    fn test_parse_scope_last_month() {
        let now = utc(2024, 2, 15, 10, 30, 0, 0);
        let interval = parse_scope("last-month", now).unwrap();

        // All of January 2024.
        assert_eq!(interval.start, utc(2024, 1, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2024, 1, 31, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_last_month_in_january() {
        let now = utc(2024, 1, 5, 8, 0, 0, 0);
        let interval = parse_scope("last-month", now).unwrap();

        assert_eq!(interval.start, utc(2023, 12, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2023, 12, 31, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_last_year() {
        let now = utc(2024, 2, 15, 10, 30, 0, 0);
        let interval = parse_scope("last-year", now).unwrap();

        assert_eq!(interval.start, utc(2023, 1, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2023, 12, 31, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_ytd() {
        let now = utc(2024, 1, 15, 10, 30, 0, 0);
        let interval = parse_scope("ytd", now).unwrap();

        assert_eq!(interval.start, utc(2024, 1, 1, 0, 0, 0, 0));
        // End of the current day.
        assert_eq!(interval.end, utc(2024, 1, 15, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_year() {
        let now = utc(2024, 6, 1, 0, 0, 0, 0);
        let interval = parse_scope("2023", now).unwrap();

        assert_eq!(interval.start, utc(2023, 1, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2023, 12, 31, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_year_month() {
        let now = utc(2024, 6, 1, 0, 0, 0, 0);
        let interval = parse_scope("2023-11", now).unwrap();

        assert_eq!(interval.start, utc(2023, 11, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2023, 11, 30, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_leap_year_february() {
        let now = utc(2024, 6, 1, 0, 0, 0, 0);
        let interval = parse_scope("2024-02", now).unwrap();

        assert_eq!(interval.start, utc(2024, 2, 1, 0, 0, 0, 0));
        assert_eq!(interval.end, utc(2024, 2, 29, 23, 59, 59, 999_999));
    }

    #[test]
    fn test_parse_scope_invalid_token() {
        let error = parse_scope("invalid-scope", Utc::now()).unwrap_err();
        assert!(error.to_string().contains("'invalid-scope'"));
    }

    #[test]
    fn test_parse_scope_invalid_month() {
        assert!(parse_scope("2023-13", Utc::now()).is_err());
        assert!(parse_scope("2023-00", Utc::now()).is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let interval = parse_scope("2023-11", Utc::now()).unwrap();
        assert!(interval.contains(interval.start));
        assert!(interval.contains(interval.end));
        assert!(!interval.contains(interval.start - Duration::microseconds(1)));
        assert!(!interval.contains(interval.end + Duration::microseconds(1)));
    }
}
