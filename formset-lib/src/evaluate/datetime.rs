//! Date parsing and formatting used by the `datetime` rule.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Utc;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parses a date or date-time value as UTC.
///
/// Returns `None` for text shorter than eight characters, text in no known
/// format, and instants before the Unix epoch.
///
/// ```
/// use formset_lib::evaluate::parse_datetime;
///
/// assert!(parse_datetime("2024-02-29").is_some());
/// assert!(parse_datetime("1969-12-31").is_none());
/// assert!(parse_datetime("3/4/21").is_none());
/// ```
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.len() < 8 {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        })?;

    (parsed.timestamp() >= 0).then_some(parsed)
}

/// Returns `true` if the instant falls exactly on midnight.
pub fn is_date_only(dt: &DateTime<Utc>) -> bool {
    dt.time() == NaiveTime::MIN
}

/// Formats an instant as `YYYY-MM-DD`, or `YYYY-MM-DD HH:MM:SS` unless
/// `date_only` is set.
pub fn format_datetime(dt: &DateTime<Utc>, date_only: bool) -> String {
    if date_only {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_known_formats() {
        for value in [
            "2024-01-15",
            "2024/01/15",
            "01/15/2024",
            "2024-01-15T10:30:00",
            "2024-01-15 10:30",
            "2024-01-15T10:30:00Z",
            "2024-01-15T12:30:00+02:00",
        ] {
            assert!(parse_datetime(value).is_some(), "{value} should parse");
        }
    }

    #[test]
    fn test_offset_is_normalised_to_utc() {
        let dt = parse_datetime("2024-01-15T12:30:00+02:00").unwrap();
        assert_eq!(format_datetime(&dt, false), "2024-01-15 10:30:00");
    }

    #[test]
    fn test_rejects_short_and_pre_epoch_values() {
        assert!(parse_datetime("1/1/24").is_none());
        assert!(parse_datetime("1950-06-01").is_none());
        assert!(parse_datetime("not a date at all").is_none());
    }

    #[test]
    fn test_date_only_detection() {
        let date = parse_datetime("2024-01-15").unwrap();
        let date_time = parse_datetime("2024-01-15 08:00").unwrap();

        assert!(is_date_only(&date));
        assert!(!is_date_only(&date_time));
        assert_eq!(format_datetime(&date, true), "2024-01-15");
    }
}
