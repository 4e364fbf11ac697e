//! Test data generators for creating synthetic band values.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

use chrono::{Duration, NaiveDate};

/// Creates a band with predictable values.
///
/// Each cell value is `band * 10000 + col * 100 + row`, so any value read
/// back identifies exactly where it came from.
///
/// # Example
///
/// ```
/// use test_utils::ramp_band;
///
/// let band = ramp_band(3, 2, 1);
/// assert_eq!(band.len(), 6);
/// assert_eq!(band[0], 10000.0); // col 0, row 0
/// assert_eq!(band[1], 10100.0); // col 1, row 0
/// assert_eq!(band[3], 10001.0); // col 0, row 1
/// ```
pub fn ramp_band(width: usize, height: usize, band: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((band * 10000 + col * 100 + row) as f32);
        }
    }
    data
}

/// Creates a band filled with a constant value.
pub fn constant_band(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replace the cells at `(col, row)` positions with `nodata`.
pub fn with_nodata(mut band: Vec<f32>, width: usize, cells: &[(usize, usize)], nodata: f32) -> Vec<f32> {
    for &(col, row) in cells {
        band[row * width + col] = nodata;
    }
    band
}

/// `count` dates starting at `start`, `step_days` apart, as ISO strings.
pub fn date_series(start: NaiveDate, count: usize, step_days: i64) -> Vec<String> {
    (0..count)
        .map(|i| (start + Duration::days(step_days * i as i64)).format("%Y-%m-%d").to_string())
        .collect()
}

/// A `band-dates` YAML block mapping bands `1..` to `dates`.
pub fn band_dates_yaml(dates: &[String]) -> String {
    let mut yaml = String::from("band-dates:\n");
    for (i, date) in dates.iter().enumerate() {
        yaml.push_str(&format!("  {}: {}\n", i + 1, date));
    }
    yaml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_band_encodes_position() {
        let band = ramp_band(4, 3, 2);
        assert_eq!(band[2 * 4 + 3], 20302.0);
    }

    #[test]
    fn test_with_nodata() {
        let band = with_nodata(constant_band(2, 2, 1.0), 2, &[(1, 0)], -9999.0);
        assert_eq!(band, vec![1.0, -9999.0, 1.0, 1.0]);
    }

    #[test]
    fn test_date_series_yaml() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 30).unwrap();
        let dates = date_series(start, 3, 2);
        assert_eq!(dates, vec!["2000-01-30", "2000-02-01", "2000-02-03"]);
        assert_eq!(
            band_dates_yaml(&dates[..2]),
            "band-dates:\n  1: 2000-01-30\n  2: 2000-02-01\n"
        );
    }
}
