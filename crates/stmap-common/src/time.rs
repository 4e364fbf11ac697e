//! Date handling for band selection.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// How a request picks bands out of an asset's time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSelector {
    /// `b<index>`: a 1-based band index, no date matching.
    Band(usize),
    /// A single date: the band closest in time.
    Date(NaiveDate),
    /// A closed date interval, inclusive at both ends.
    Range(NaiveDate, NaiveDate),
}

impl DateSelector {
    /// Parse a selector string.
    ///
    /// Supports:
    /// - Band index: "b3"
    /// - Single date: "2015-06-01" or "2015-06-01T12:00:00Z"
    /// - Range: "[2015-01-01, 2015-12-31]" or "2015-01-01/2015-12-31"
    pub fn parse(s: &str) -> Result<Self, DateParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DateParseError::Empty);
        }

        if let Some(index) = s.strip_prefix('b').or_else(|| s.strip_prefix('B')) {
            return index
                .parse::<usize>()
                .map(DateSelector::Band)
                .map_err(|_| DateParseError::InvalidBand(s.to_string()));
        }

        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            return match parts.as_slice() {
                [single] => Ok(DateSelector::Date(parse_date(single)?)),
                [start, end] => Ok(DateSelector::Range(parse_date(start)?, parse_date(end)?)),
                _ => Err(DateParseError::InvalidRange(s.to_string())),
            };
        }

        if let Some((start, end)) = s.split_once('/') {
            return Ok(DateSelector::Range(
                parse_date(start.trim())?,
                parse_date(end.trim())?,
            ));
        }

        Ok(DateSelector::Date(parse_date(s)?))
    }
}

/// Parse a calendar date from ISO 8601 text. Times of day are dropped.
pub fn parse_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let s = s.trim().trim_matches(|c| c == '"' || c == '\'');

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ndt.date());
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.date());
    }

    Err(DateParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum DateParseError {
    #[error("Empty date selector")]
    Empty,

    #[error("Invalid date format: {0}")]
    InvalidFormat(String),

    #[error("Invalid band selector: {0}. Expected 'b<index>'")]
    InvalidBand(String),

    #[error("Invalid date range: {0}. Expected '[start, end]'")]
    InvalidRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_band_selector() {
        assert_eq!(DateSelector::parse("b3").unwrap(), DateSelector::Band(3));
        assert!(DateSelector::parse("bx").is_err());
    }

    #[test]
    fn test_parse_single_date() {
        assert_eq!(
            DateSelector::parse("1990-06-01").unwrap(),
            DateSelector::Date(date(1990, 6, 1))
        );
        assert_eq!(
            DateSelector::parse("1990-06-01T18:30:00Z").unwrap(),
            DateSelector::Date(date(1990, 6, 1))
        );
    }

    #[test]
    fn test_parse_ranges() {
        let expected = DateSelector::Range(date(2000, 1, 1), date(2000, 12, 31));
        assert_eq!(DateSelector::parse("[2000-01-01, 2000-12-31]").unwrap(), expected);
        assert_eq!(DateSelector::parse("2000-01-01/2000-12-31").unwrap(), expected);
        assert!(DateSelector::parse("[2000-01-01, 2000-02-01, 2000-03-01]").is_err());
    }

    #[test]
    fn test_bare_integer_is_not_a_band() {
        // Band indices need the `b` prefix; a bare number is not a date either.
        assert!(matches!(
            DateSelector::parse("1"),
            Err(DateParseError::InvalidFormat(_))
        ));
        assert!(DateSelector::parse("[1, 2]").is_err());
        assert_eq!(DateSelector::parse("B1").unwrap(), DateSelector::Band(1));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(DateSelector::parse("").is_err());
        assert!(DateSelector::parse("yesterday").is_err());
    }
}
