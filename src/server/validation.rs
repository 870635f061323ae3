//! Query parameter checks, run before any store or catalog access.

use super::error::ApiError;
use crate::config::MarketSettings;
use chrono::{Datelike, Utc};

pub const MIN_YEAR: i32 = 1900;
pub const SEARCH_TYPES: &[&str] = &["track", "artist", "album", "playlist"];
pub const MAX_YEAR_RANGE_SPAN: i32 = 10;

/// Uppercases `raw` (default "IN") and checks it against the configured markets.
pub fn validate_market<'a>(
    raw: Option<&str>,
    markets: &'a [MarketSettings],
) -> Result<&'a MarketSettings, ApiError> {
    let code = raw.unwrap_or("IN").trim().to_uppercase();
    markets.iter().find(|m| m.code == code).ok_or_else(|| {
        let supported: Vec<&str> = markets.iter().map(|m| m.code.as_str()).collect();
        ApiError::validation(format!(
            "Invalid market '{}'. Supported markets: {}",
            code,
            supported.join(", ")
        ))
    })
}

pub fn max_year() -> i32 {
    Utc::now().year() + 1
}

pub fn validate_year(year: i32) -> Result<i32, ApiError> {
    if year < MIN_YEAR || year > max_year() {
        return Err(ApiError::validation(format!(
            "Invalid year '{}'. Must be between {} and {}",
            year,
            MIN_YEAR,
            max_year()
        )));
    }
    Ok(year)
}

/// Parses a required year parameter.
pub fn parse_year(raw: Option<&str>) -> Result<i32, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::validation("Missing required parameter 'year'"))?;
    let year = raw
        .trim()
        .parse::<i32>()
        .map_err(|_| ApiError::validation(format!("Invalid year '{}'", raw)))?;
    validate_year(year)
}

/// Parses an optional limit, which must fall in `1..=max`.
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> Result<usize, ApiError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=max).contains(&limit) => Ok(limit),
        _ => Err(ApiError::validation(format!(
            "Limit must be between 1 and {}",
            max
        ))),
    }
}

pub fn parse_offset(raw: Option<&str>) -> Result<usize, ApiError> {
    match raw {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::validation("Offset must be a non-negative integer")),
    }
}

pub fn validate_search_type(raw: Option<&str>) -> Result<String, ApiError> {
    let search_type = raw.unwrap_or("track").trim().to_lowercase();
    if !SEARCH_TYPES.contains(&search_type.as_str()) {
        return Err(ApiError::validation(format!(
            "Invalid search type '{}'. Supported types: {}",
            search_type,
            SEARCH_TYPES.join(", ")
        )));
    }
    Ok(search_type)
}

/// Parses an optional boolean flag written as true/false or 1/0.
pub fn parse_flag(name: &str, raw: Option<&str>, default: bool) -> Result<bool, ApiError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ApiError::validation(format!(
            "Parameter '{}' must be true or false",
            name
        ))),
    }
}

/// Parses a `YYYY-YYYY` path segment into validated (start, end) years.
pub fn parse_year_range(raw: &str) -> Result<(i32, i32), ApiError> {
    let invalid = || ApiError::validation(format!("Invalid year range '{}', expected YYYY-YYYY", raw));
    let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
    let start = start.trim().parse::<i32>().map_err(|_| invalid())?;
    let end = end.trim().parse::<i32>().map_err(|_| invalid())?;
    validate_year(start)?;
    validate_year(end)?;
    if start > end {
        return Err(ApiError::validation(
            "Start year must be less than or equal to end year",
        ));
    }
    if end - start > MAX_YEAR_RANGE_SPAN {
        return Err(ApiError::validation(format!(
            "Year range cannot exceed {} years",
            MAX_YEAR_RANGE_SPAN
        )));
    }
    Ok((start, end))
}
