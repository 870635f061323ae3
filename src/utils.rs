use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Formats a track duration as `M:SS`.
pub fn format_duration(duration_ms: i64) -> String {
    if duration_ms <= 0 {
        return "0:00".to_string();
    }
    let total_secs = duration_ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Parses a catalog release date of day, month or year precision.
///
/// Partial dates resolve to the first day of their period.
pub fn parse_release_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    match value.len() {
        10 => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok(),
        4 => value
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        _ => None,
    }
}

/// Parses an RFC 3339 timestamp into unix seconds, `None` if absent or malformed.
pub fn parse_timestamp(value: Option<&str>) -> Option<i64> {
    let value = value?;
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

pub fn today_in_timezone(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}
